//! Recommendation service for a learning-management platform.
//!
//! Ranks courses and in-course activities for a user with five strategies:
//! overall popularity, collaborative filtering over shared enrollments,
//! content similarity, stated-interest matching, and a weighted hybrid of
//! the other four. Data comes from the platform's REST web services and a
//! Postgres user-profile store; results are served over an axum HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod recommenders;
pub mod services;
