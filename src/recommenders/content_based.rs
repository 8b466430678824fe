//! Content similarity: rank items by how close their text is to what the
//! user is already enrolled in or has engaged with.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Course, Recommendation, Strategy};
use crate::services::LearningPlatform;

use super::features::{self, CourseFeatures, MIN_DESCRIPTION_LENGTH};
use super::similarity::{self, ACTIVITY_VOCAB_LIMIT, COURSE_VOCAB_LIMIT};
use super::Recommender;

const SIMILARITY_THRESHOLD: f64 = 0.1;
const ITEM_SCORE_THRESHOLD: f64 = 0.2;

const TAG_BOOST_PER_TAG: f64 = 0.1;
const TAG_BOOST_CAP: f64 = 0.4;

/// Additive boost for tags shared with the user's courses. The boosted
/// similarity is re-capped at 1.0 by the caller.
fn tag_boost(shared_tags: usize) -> f64 {
    (shared_tags as f64 * TAG_BOOST_PER_TAG).min(TAG_BOOST_CAP)
}

pub struct ContentBasedRecommender {
    platform: Arc<dyn LearningPlatform>,
}

impl ContentBasedRecommender {
    pub fn new(platform: Arc<dyn LearningPlatform>) -> Self {
        Self { platform }
    }

    async fn all_tags(&self) -> HashMap<i64, Vec<String>> {
        match self.platform.all_course_tags().await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch course tags");
                HashMap::new()
            }
        }
    }

    /// Similarity score per candidate course against the user's enrolled
    /// courses. Empty when the user has no enrollments or there is not
    /// enough analyzable text on either side.
    fn course_similarity_scores(
        all_courses: &[Course],
        enrolled: &HashSet<i64>,
        all_tags: &HashMap<i64, Vec<String>>,
    ) -> HashMap<i64, f64> {
        if enrolled.is_empty() {
            return HashMap::new();
        }

        let mut own_features: Vec<CourseFeatures> = Vec::new();
        let mut own_tags: HashSet<String> = HashSet::new();
        let mut candidate_features: Vec<CourseFeatures> = Vec::new();

        for course in all_courses {
            let tags = all_tags.get(&course.id).cloned().unwrap_or_default();
            let features = features::course_features(course, &tags);

            if enrolled.contains(&course.id) {
                own_tags.extend(features.tags.iter().cloned());
                own_features.push(features);
            } else if !course.is_site_course() {
                candidate_features.push(features);
            }
        }

        let reference_texts: Vec<String> = own_features
            .iter()
            .filter(|f| f.has_analyzable_content())
            .map(|f| f.content.clone())
            .collect();

        let analyzable: Vec<&CourseFeatures> = candidate_features
            .iter()
            .filter(|f| f.has_analyzable_content())
            .collect();
        let candidate_texts: Vec<String> =
            analyzable.iter().map(|f| f.content.clone()).collect();

        if reference_texts.is_empty() || candidate_texts.is_empty() {
            tracing::warn!("Not enough content for similarity calculation");
            return HashMap::new();
        }

        let similarities =
            similarity::max_similarities(&reference_texts, &candidate_texts, COURSE_VOCAB_LIMIT, true);

        let mut scores = HashMap::new();
        for (features, sim) in analyzable.iter().zip(similarities) {
            if sim < SIMILARITY_THRESHOLD {
                continue;
            }

            let shared = features
                .tags
                .iter()
                .filter(|tag| own_tags.contains(*tag))
                .count();
            let score = if shared > 0 {
                (sim + tag_boost(shared)).min(1.0)
            } else {
                sim
            };
            scores.insert(features.course_id, score);
        }

        tracing::info!(
            matched = scores.len(),
            "Calculated course content similarity"
        );
        scores
    }
}

#[async_trait]
impl Recommender for ContentBasedRecommender {
    async fn recommend_courses(&self, user_id: i64, limit: usize) -> Vec<Recommendation> {
        tracing::info!(user_id, "Generating content-based course recommendations");

        let all_courses = super::site_courses(self.platform.as_ref()).await;
        let enrolled = super::enrolled_course_ids(self.platform.as_ref(), user_id).await;
        let all_tags = self.all_tags().await;

        let scores = Self::course_similarity_scores(&all_courses, &enrolled, &all_tags);

        if scores.is_empty() {
            tracing::info!(user_id, "No content similarity data, falling back to newest courses");
            let candidates = super::newest_first(super::candidate_courses(&all_courses, &enrolled));
            return candidates
                .into_iter()
                .take(limit)
                .map(|course| {
                    Recommendation::course(
                        course,
                        Strategy::ContentBased,
                        None,
                        "Recent course (no similar content found)".to_string(),
                    )
                })
                .collect();
        }

        let course_map: HashMap<i64, &Course> =
            all_courses.iter().map(|course| (course.id, course)).collect();

        // Rank in catalog order so equal scores keep it
        let mut ranked: Vec<(i64, f64)> = all_courses
            .iter()
            .filter_map(|course| scores.get(&course.id).map(|&score| (course.id, score)))
            .collect();
        super::rank_descending(&mut ranked);

        let mut recommendations = Vec::new();
        for (course_id, score) in ranked {
            if recommendations.len() >= limit {
                break;
            }
            if score < ITEM_SCORE_THRESHOLD {
                continue;
            }

            if let Some(course) = course_map.get(&course_id) {
                let tags = all_tags.get(&course_id).cloned().unwrap_or_default();
                let mut reason = format!(
                    "This course has similar content to courses you're enrolled in (similarity score: {:.2})",
                    score
                );
                if !tags.is_empty() {
                    let shown: Vec<&str> =
                        tags.iter().take(3).map(String::as_str).collect();
                    reason.push_str(&format!(" and shares tags: {}", shown.join(", ")));
                }

                recommendations.push(
                    Recommendation::course(
                        (*course).clone(),
                        Strategy::ContentBased,
                        Some(score),
                        reason,
                    )
                    .with_tags(tags),
                );
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
            "Generating content-based activity recommendations"
        );

        let activities = super::course_activities(self.platform.as_ref(), course_id).await;

        // Completed activities first, then merely viewed ones
        let report = match self.platform.completion_status(user_id, course_id).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(user_id, course_id, error = %e, "Failed to fetch completion status");
                Default::default()
            }
        };

        let mut engaged: Vec<i64> = Vec::new();
        for status in &report.statuses {
            if status.cmid != 0 && status.is_completed() {
                engaged.push(status.cmid);
            }
        }
        for status in &report.statuses {
            if status.cmid != 0
                && !status.is_completed()
                && status.viewed
                && !engaged.contains(&status.cmid)
            {
                engaged.push(status.cmid);
            }
        }
        let engaged_ids: HashSet<i64> = engaged.iter().copied().collect();

        let structural_fallback = |skip: &HashSet<i64>| -> Vec<Recommendation> {
            activities
                .iter()
                .filter(|activity| !skip.contains(&activity.id))
                .take(limit)
                .map(|activity| {
                    Recommendation::activity(
                        activity.clone(),
                        Strategy::ContentBased,
                        None,
                        "Suggested based on course structure".to_string(),
                    )
                })
                .collect()
        };

        if engaged.is_empty() {
            tracing::info!(user_id, course_id, "No engaged activities, using section order");
            return structural_fallback(&HashSet::new());
        }

        let contents: HashMap<i64, String> = activities
            .iter()
            .map(|activity| (activity.id, features::activity_content(activity)))
            .collect();

        let reference_texts: Vec<String> = engaged
            .iter()
            .filter_map(|id| contents.get(id))
            .filter(|content| content.len() >= MIN_DESCRIPTION_LENGTH)
            .cloned()
            .collect();

        let candidates: Vec<_> = activities
            .iter()
            .filter(|activity| !engaged_ids.contains(&activity.id))
            .collect();
        let analyzable: Vec<_> = candidates
            .iter()
            .filter(|activity| contents[&activity.id].len() >= MIN_DESCRIPTION_LENGTH)
            .collect();
        let candidate_texts: Vec<String> = analyzable
            .iter()
            .map(|activity| contents[&activity.id].clone())
            .collect();

        if reference_texts.is_empty() || candidate_texts.is_empty() {
            tracing::info!(
                user_id,
                course_id,
                "Not enough activity content, using section order"
            );
            return structural_fallback(&engaged_ids);
        }

        let similarities = similarity::max_similarities(
            &reference_texts,
            &candidate_texts,
            ACTIVITY_VOCAB_LIMIT,
            false,
        );

        let mut scored: Vec<(i64, f64)> = analyzable
            .iter()
            .zip(similarities)
            .filter(|(_, sim)| *sim >= ITEM_SCORE_THRESHOLD)
            .map(|(activity, sim)| (activity.id, sim))
            .collect();
        super::rank_descending(&mut scored);

        let activity_map: HashMap<i64, _> = activities
            .iter()
            .map(|activity| (activity.id, activity))
            .collect();

        let mut recommendations = Vec::new();
        for (activity_id, score) in scored {
            if recommendations.len() >= limit {
                break;
            }
            if let Some(activity) = activity_map.get(&activity_id) {
                recommendations.push(Recommendation::activity(
                    (*activity).clone(),
                    Strategy::ContentBased,
                    Some(score),
                    "Similar to activities you've engaged with".to_string(),
                ));
            }
        }

        // Top up with the remaining activities in section order
        if recommendations.len() < limit {
            let recommended: HashSet<i64> =
                recommendations.iter().map(|rec| rec.item.id()).collect();

            for activity in &activities {
                if recommended.contains(&activity.id) || engaged_ids.contains(&activity.id) {
                    continue;
                }
                recommendations.push(Recommendation::activity(
                    activity.clone(),
                    Strategy::ContentBased,
                    None,
                    "Suggested based on course structure".to_string(),
                ));
                if recommendations.len() >= limit {
                    break;
                }
            }
        }

        recommendations
    }
}
