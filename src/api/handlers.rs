use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::models::{Recommendation, Strategy};
use crate::recommenders;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_strategy() -> String {
    "popular".to_string()
}

fn default_limit() -> usize {
    5
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/v1/recommendations/courses/:user_id
///
/// An unknown strategy name is rejected with 400 before any strategy runs;
/// everything past that point degrades inside the strategy and responds 200.
pub async fn course_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<RecommendationParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let strategy: Strategy = params.strategy.parse()?;
    tracing::info!(
        user_id,
        %strategy,
        limit = params.limit,
        "Course recommendation request"
    );

    let recommender =
        recommenders::build(strategy, state.platform.clone(), state.profiles.clone());
    let recommendations = recommender.recommend_courses(user_id, params.limit).await;

    tracing::info!(
        user_id,
        count = recommendations.len(),
        "Returning course recommendations"
    );
    Ok(Json(recommendations))
}

/// GET /api/v1/recommendations/activities/:user_id/:course_id
pub async fn activity_recommendations(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(i64, i64)>,
    Query(params): Query<RecommendationParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let strategy: Strategy = params.strategy.parse()?;
    tracing::info!(
        user_id,
        course_id,
        %strategy,
        limit = params.limit,
        "Activity recommendation request"
    );

    let recommender =
        recommenders::build(strategy, state.platform.clone(), state.profiles.clone());
    let recommendations = recommender
        .recommend_activities(user_id, course_id, params.limit)
        .await;

    tracing::info!(
        user_id,
        course_id,
        count = recommendations.len(),
        "Returning activity recommendations"
    );
    Ok(Json(recommendations))
}
