use std::sync::Arc;

use crate::db::InterestSource;
use crate::services::LearningPlatform;

/// Shared application state.
///
/// Holds the two data collaborators behind trait objects so handlers and
/// tests can run against any implementation.
#[derive(Clone)]
pub struct AppState {
    pub platform: Arc<dyn LearningPlatform>,
    pub profiles: Arc<dyn InterestSource>,
}

impl AppState {
    pub fn new(platform: Arc<dyn LearningPlatform>, profiles: Arc<dyn InterestSource>) -> Self {
        Self { platform, profiles }
    }
}
