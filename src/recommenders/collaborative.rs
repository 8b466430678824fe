//! Collaborative filtering: rank items by what users with overlapping
//! enrollments are taking and completing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Course, Recommendation, Strategy, SITE_COURSE_ID};
use crate::services::LearningPlatform;

use super::Recommender;

const MIN_COMMON_COURSES: usize = 1;
const MAX_SIMILAR_USERS: usize = 10;
const SIMILARITY_THRESHOLD: f64 = 0.1;
const COURSE_SCORE_THRESHOLD: f64 = 0.2;

const ACTIVITY_COMPLETION_WEIGHT: f64 = 3.0;
const ACTIVITY_VIEW_WEIGHT: f64 = 1.0;
const ACTIVITY_SCORE_THRESHOLD: f64 = 0.1;

/// Enrollment ratings per user, keyed by course id
type EnrollmentMatrix = HashMap<i64, HashMap<i64, f64>>;

pub struct CollaborativeRecommender {
    platform: Arc<dyn LearningPlatform>,
}

impl CollaborativeRecommender {
    pub fn new(platform: Arc<dyn LearningPlatform>) -> Self {
        Self { platform }
    }

    /// Builds the user-course matrix from enrollments across all non-site
    /// courses. Every enrollment rates as 1.0.
    async fn enrollment_matrix(&self) -> EnrollmentMatrix {
        let all_courses = super::site_courses(self.platform.as_ref()).await;
        let course_ids: Vec<i64> = all_courses
            .iter()
            .filter(|course| !course.is_site_course())
            .map(|course| course.id)
            .collect();

        let enrollments = self.platform.enrolled_users_batch(&course_ids).await;

        let mut matrix = EnrollmentMatrix::new();
        for (course_id, users) in enrollments {
            for user in users {
                matrix.entry(user.id).or_default().insert(course_id, 1.0);
            }
        }

        tracing::info!(user_count = matrix.len(), "Built user-course matrix");
        matrix
    }

    /// Peers most similar to a user by cosine similarity over enrollment
    /// vectors, best first, capped at the similar-user limit. Requires at
    /// least one shared course and a similarity above the threshold.
    fn similar_users(user_id: i64, matrix: &EnrollmentMatrix) -> Vec<(i64, f64)> {
        let Some(own_courses) = matrix.get(&user_id) else {
            return Vec::new();
        };
        if own_courses.is_empty() {
            return Vec::new();
        }

        let own_magnitude = own_courses
            .values()
            .map(|rating| rating * rating)
            .sum::<f64>()
            .sqrt();

        let mut similarities = Vec::new();
        for (&other_id, other_courses) in matrix {
            if other_id == user_id {
                continue;
            }

            let mut dot_product = 0.0;
            let mut common = 0;
            for (course_id, rating) in own_courses {
                if let Some(other_rating) = other_courses.get(course_id) {
                    dot_product += rating * other_rating;
                    common += 1;
                }
            }

            if common < MIN_COMMON_COURSES {
                continue;
            }

            let other_magnitude = other_courses
                .values()
                .map(|rating| rating * rating)
                .sum::<f64>()
                .sqrt();

            if own_magnitude > 0.0 && other_magnitude > 0.0 {
                let similarity = dot_product / (own_magnitude * other_magnitude);
                if similarity >= SIMILARITY_THRESHOLD {
                    similarities.push((other_id, similarity));
                }
            }
        }

        similarities.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        similarities.truncate(MAX_SIMILAR_USERS);
        similarities
    }

    /// Activities a user has engaged with in a course, weighted by
    /// completion over views
    async fn activity_engagement(&self, user_id: i64, course_id: i64) -> HashMap<i64, f64> {
        let report = match self.platform.completion_status(user_id, course_id).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(user_id, course_id, error = %e, "Failed to fetch completion status");
                return HashMap::new();
            }
        };

        report
            .statuses
            .iter()
            .filter(|status| status.cmid != 0)
            .filter_map(|status| {
                let mut engagement = 0.0;
                if status.is_completed() {
                    engagement += ACTIVITY_COMPLETION_WEIGHT;
                }
                if status.viewed {
                    engagement += ACTIVITY_VIEW_WEIGHT;
                }
                (engagement > 0.0).then_some((status.cmid, engagement))
            })
            .collect()
    }
}

#[async_trait]
impl Recommender for CollaborativeRecommender {
    async fn recommend_courses(&self, user_id: i64, limit: usize) -> Vec<Recommendation> {
        tracing::info!(user_id, "Generating collaborative course recommendations");

        let matrix = self.enrollment_matrix().await;
        let enrolled = super::enrolled_course_ids(self.platform.as_ref(), user_id).await;
        let peers = Self::similar_users(user_id, &matrix);

        let all_courses = super::site_courses(self.platform.as_ref()).await;

        if peers.is_empty() {
            tracing::info!(user_id, "No similar users found, falling back to newest courses");
            let candidates = super::newest_first(super::candidate_courses(&all_courses, &enrolled));
            return candidates
                .into_iter()
                .take(limit)
                .map(|course| {
                    Recommendation::course(
                        course,
                        Strategy::Collaborative,
                        None,
                        "Recent course (no collaborative data available)".to_string(),
                    )
                })
                .collect();
        }

        let mut course_scores: HashMap<i64, f64> = HashMap::new();
        let mut peer_counts: HashMap<i64, usize> = HashMap::new();

        for (peer_id, similarity) in &peers {
            if let Some(peer_courses) = matrix.get(peer_id) {
                for (&course_id, &rating) in peer_courses {
                    if course_id != SITE_COURSE_ID && !enrolled.contains(&course_id) {
                        *course_scores.entry(course_id).or_insert(0.0) += similarity * rating;
                        *peer_counts.entry(course_id).or_insert(0) += 1;
                    }
                }
            }
        }

        let course_map: HashMap<i64, &Course> =
            all_courses.iter().map(|course| (course.id, course)).collect();

        // Rank in catalog order so equal scores keep it
        let mut ranked: Vec<(i64, f64)> = all_courses
            .iter()
            .filter_map(|course| course_scores.get(&course.id).map(|&score| (course.id, score)))
            .collect();
        super::rank_descending(&mut ranked);

        let mut recommendations = Vec::new();
        for (course_id, score) in ranked {
            if recommendations.len() >= limit {
                break;
            }
            if score < COURSE_SCORE_THRESHOLD {
                continue;
            }

            if let Some(course) = course_map.get(&course_id) {
                let peer_count = peer_counts.get(&course_id).copied().unwrap_or(0);
                let reason = format!(
                    "Recommended because {} similar users are enrolled in this course (score: {:.2})",
                    peer_count, score
                );
                recommendations.push(Recommendation::course(
                    (*course).clone(),
                    Strategy::Collaborative,
                    Some(score),
                    reason,
                ));
            }
        }

        recommendations
    }

    async fn recommend_activities(
        &self,
        user_id: i64,
        course_id: i64,
        limit: usize,
    ) -> Vec<Recommendation> {
        tracing::info!(
            user_id,
            course_id,
            "Generating collaborative activity recommendations"
        );

        let activities = super::course_activities(self.platform.as_ref(), course_id).await;
        let own_engagement = self.activity_engagement(user_id, course_id).await;
        let engaged_ids: HashSet<i64> = own_engagement.keys().copied().collect();

        let matrix = self.enrollment_matrix().await;
        let peers = Self::similar_users(user_id, &matrix);

        if peers.is_empty() {
            tracing::info!(user_id, course_id, "No similar users found, using name order");
            let mut fallback: Vec<_> = activities
                .into_iter()
                .filter(|activity| !engaged_ids.contains(&activity.id))
                .collect();
            fallback.sort_by(|a, b| a.name.cmp(&b.name));

            return fallback
                .into_iter()
                .take(limit)
                .map(|activity| {
                    Recommendation::activity(
                        activity,
                        Strategy::Collaborative,
                        None,
                        "Suggested activity (no collaborative data available)".to_string(),
                    )
                })
                .collect();
        }

        let mut activity_scores: HashMap<i64, f64> = HashMap::new();
        let mut peer_counts: HashMap<i64, usize> = HashMap::new();

        for (peer_id, similarity) in &peers {
            let peer_engagement = self.activity_engagement(*peer_id, course_id).await;
            for (activity_id, engagement) in peer_engagement {
                if !engaged_ids.contains(&activity_id) {
                    *activity_scores.entry(activity_id).or_insert(0.0) += similarity * engagement;
                    *peer_counts.entry(activity_id).or_insert(0) += 1;
                }
            }
        }

        let activity_map: HashMap<i64, _> = activities
            .iter()
            .map(|activity| (activity.id, activity))
            .collect();

        // Rank in section order so equal scores keep it
        let mut ranked: Vec<(i64, f64)> = activities
            .iter()
            .filter_map(|activity| {
                activity_scores
                    .get(&activity.id)
                    .map(|&score| (activity.id, score))
            })
            .collect();
        super::rank_descending(&mut ranked);

        let mut recommendations = Vec::new();
        for (activity_id, score) in ranked {
            if recommendations.len() >= limit {
                break;
            }
            if score < ACTIVITY_SCORE_THRESHOLD {
                continue;
            }

            if let Some(activity) = activity_map.get(&activity_id) {
                let peer_count = peer_counts.get(&activity_id).copied().unwrap_or(0);
                let reason = format!(
                    "Recommended because {} similar users engaged with this activity (score: {:.2})",
                    peer_count, score
                );
                recommendations.push(Recommendation::activity(
                    (*activity).clone(),
                    Strategy::Collaborative,
                    Some(score),
                    reason,
                ));
            }
        }

        // Top up with untouched activities in section order
        if recommendations.len() < limit {
            let recommended: HashSet<i64> =
                recommendations.iter().map(|rec| rec.item.id()).collect();

            for activity in &activities {
                if recommended.contains(&activity.id) || engaged_ids.contains(&activity.id) {
                    continue;
                }
                recommendations.push(Recommendation::activity(
                    activity.clone(),
                    Strategy::Collaborative,
                    None,
                    "Additional suggestion based on course structure".to_string(),
                ));
                if recommendations.len() >= limit {
                    break;
                }
            }
        }

        recommendations
    }
}
