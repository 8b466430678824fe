pub mod lms;

pub use lms::{LearningPlatform, LmsClient};
