//! Recommendation strategies over courses and in-course activities.

pub mod collaborative;
pub mod content_based;
pub mod features;
pub mod hybrid;
pub mod interests_based;
pub mod popular;
pub mod similarity;

#[cfg(test)]
pub(crate) mod testing;

pub use collaborative::CollaborativeRecommender;
pub use content_based::ContentBasedRecommender;
pub use hybrid::HybridRecommender;
pub use interests_based::InterestsBasedRecommender;
pub use popular::PopularRecommender;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::db::InterestSource;
use crate::models::{Activity, Course, Recommendation, Strategy};
use crate::services::LearningPlatform;

/// One ranking strategy.
///
/// Implementations never fail: upstream trouble is logged where it happens
/// and degrades to a fallback ranking or an empty list. Results are ordered
/// most relevant first and capped at `limit`.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend_courses(&self, user_id: i64, limit: usize) -> Vec<Recommendation>;

    async fn recommend_activities(
        &self,
        user_id: i64,
        course_id: i64,
        limit: usize,
    ) -> Vec<Recommendation>;
}

/// Builds the recommender registered for a strategy
pub fn build(
    strategy: Strategy,
    platform: Arc<dyn LearningPlatform>,
    profiles: Arc<dyn InterestSource>,
) -> Box<dyn Recommender> {
    match strategy {
        Strategy::Popular => Box::new(PopularRecommender::new(platform)),
        Strategy::Collaborative => Box::new(CollaborativeRecommender::new(platform)),
        Strategy::ContentBased => Box::new(ContentBasedRecommender::new(platform)),
        Strategy::InterestsBased => Box::new(InterestsBasedRecommender::new(platform, profiles)),
        Strategy::Hybrid => Box::new(HybridRecommender::new(platform, profiles)),
    }
}

// Shared lookups. A failed fetch degrades to an empty collection with a
// warning so strategies can take their fallback path.

pub(crate) async fn site_courses(platform: &dyn LearningPlatform) -> Vec<Course> {
    match platform.site_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch site courses");
            Vec::new()
        }
    }
}

pub(crate) async fn user_courses(platform: &dyn LearningPlatform, user_id: i64) -> Vec<Course> {
    match platform.user_courses(user_id).await {
        Ok(courses) => courses,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Failed to fetch user courses");
            Vec::new()
        }
    }
}

pub(crate) async fn enrolled_course_ids(
    platform: &dyn LearningPlatform,
    user_id: i64,
) -> HashSet<i64> {
    user_courses(platform, user_id)
        .await
        .iter()
        .map(|course| course.id)
        .collect()
}

/// All activities of a course, flattened across sections in section order
pub(crate) async fn course_activities(
    platform: &dyn LearningPlatform,
    course_id: i64,
) -> Vec<Activity> {
    match platform.course_contents(course_id).await {
        Ok(sections) => sections
            .into_iter()
            .flat_map(|section| section.modules)
            .collect(),
        Err(e) => {
            tracing::warn!(course_id, error = %e, "Failed to fetch course contents");
            Vec::new()
        }
    }
}

pub(crate) async fn completed_activity_ids(
    platform: &dyn LearningPlatform,
    user_id: i64,
    course_id: i64,
) -> HashSet<i64> {
    match platform.completion_status(user_id, course_id).await {
        Ok(report) => report.completed_ids().into_iter().collect(),
        Err(e) => {
            tracing::warn!(user_id, course_id, error = %e, "Failed to fetch completion status");
            HashSet::new()
        }
    }
}

/// Courses open for recommendation: everything except the site course and
/// the user's current enrollments
pub(crate) fn candidate_courses(all_courses: &[Course], enrolled: &HashSet<i64>) -> Vec<Course> {
    all_courses
        .iter()
        .filter(|course| !course.is_site_course() && !enrolled.contains(&course.id))
        .cloned()
        .collect()
}

/// Newest-first ordering used by the no-signal fallbacks
pub(crate) fn newest_first(mut courses: Vec<Course>) -> Vec<Course> {
    courses.sort_by(|a, b| b.time_created.cmp(&a.time_created));
    courses
}

/// Stable descending sort by score; ties keep their discovery order
pub(crate) fn rank_descending<T>(scored: &mut [(T, f64)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}
