//! Interests strategy: match the user's stated interests against course and
//! activity text and tags.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::db::InterestSource;
use crate::models::{Course, Recommendation, Strategy};
use crate::services::LearningPlatform;

use super::features::{self, MIN_DESCRIPTION_LENGTH};
use super::similarity;
use super::Recommender;

const DIRECT_INTEREST_MATCH_WEIGHT: f64 = 2.0;
const TAG_MATCH_WEIGHT: f64 = 1.5;
const CONTENT_SIMILARITY_WEIGHT: f64 = 1.0;
const ITEM_SCORE_THRESHOLD: f64 = 0.2;
const MAX_MATCH_SCORE: f64 = 5.0;

/// Outcome of matching one item against the user's interests
struct InterestMatch {
    score: f64,
    matched_interests: Vec<String>,
}

pub struct InterestsBasedRecommender {
    platform: Arc<dyn LearningPlatform>,
    profiles: Arc<dyn InterestSource>,
}

impl InterestsBasedRecommender {
    pub fn new(platform: Arc<dyn LearningPlatform>, profiles: Arc<dyn InterestSource>) -> Self {
        Self { platform, profiles }
    }

    async fn user_interests(&self, user_id: i64) -> Vec<String> {
        match self.profiles.interests(user_id).await {
            Ok(interests) => {
                tracing::info!(user_id, count = interests.len(), "Fetched user interests");
                interests
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to fetch user interests");
                Vec::new()
            }
        }
    }

    /// Scores one item against the interests. A verbatim interest in the
    /// content scores highest, a tag overlapping an interest (substring in
    /// either direction) next, and residual content similarity least.
    /// Returns `None` when the combined score does not clear the threshold.
    fn match_item(
        interests: &[String],
        interest_text: &str,
        content: &str,
        tags: &[String],
    ) -> Option<InterestMatch> {
        if content.len() < MIN_DESCRIPTION_LENGTH {
            return None;
        }

        let mut score = 0.0;
        let mut matched_interests: Vec<String> = Vec::new();

        for interest in interests {
            let clean_interest = features::clean_text(interest);
            if !clean_interest.is_empty() && content.contains(&clean_interest) {
                score += DIRECT_INTEREST_MATCH_WEIGHT;
                matched_interests.push(interest.clone());
            }
        }

        for interest in interests {
            let clean_interest = features::clean_text(interest);
            if clean_interest.is_empty() {
                continue;
            }
            for tag in tags {
                let clean_tag = features::clean_text(tag);
                if clean_tag.is_empty() {
                    continue;
                }
                if clean_interest.contains(&clean_tag) || clean_tag.contains(&clean_interest) {
                    score += TAG_MATCH_WEIGHT;
                    if !matched_interests.contains(interest) {
                        matched_interests.push(interest.clone());
                    }
                }
            }
        }

        score += similarity::cosine_pair(interest_text, content) * CONTENT_SIMILARITY_WEIGHT;

        (score > ITEM_SCORE_THRESHOLD).then_some(InterestMatch {
            score: score.min(MAX_MATCH_SCORE),
            matched_interests,
        })
    }

    fn reason(matched: &InterestMatch) -> String {
        if matched.matched_interests.is_empty() {
            format!("Content related to your interests (score: {:.2})", matched.score)
        } else {
            format!(
                "Matches your interests: {} (score: {:.2})",
                matched.matched_interests.join(", "),
                matched.score
            )
        }
    }
}

#[async_trait]
impl Recommender for InterestsBasedRecommender {
    async fn recommend_courses(&self, user_id: i64, limit: usize) -> Vec<Recommendation> {
        tracing::info!(user_id, "Generating interest-based course recommendations");

        let all_courses = super::site_courses(self.platform.as_ref()).await;
        let enrolled = super::enrolled_course_ids(self.platform.as_ref(), user_id).await;
        let all_tags = match self.platform.all_course_tags().await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch course tags");
                HashMap::new()
            }
        };

        let interests = self.user_interests(user_id).await;

        let mut matches: HashMap<i64, InterestMatch> = HashMap::new();
        if !interests.is_empty() {
            let interest_text = interests
                .iter()
                .map(|interest| features::clean_text(interest))
                .collect::<Vec<_>>()
                .join(" ");

            for course in &all_courses {
                if course.is_site_course() {
                    continue;
                }
                let tags = all_tags.get(&course.id).cloned().unwrap_or_default();
                let features = features::course_features(course, &tags);

                if let Some(matched) =
                    Self::match_item(&interests, &interest_text, &features.content, &features.tags)
                {
                    matches.insert(course.id, matched);
                }
            }
        }

        if matches.is_empty() {
            tracing::info!(user_id, "No interest matches, falling back to recent courses");
            let candidates = super::newest_first(super::candidate_courses(&all_courses, &enrolled));
            return candidates
                .into_iter()
                .take(limit)
                .map(|course| {
                    Recommendation::course(
                        course,
                        Strategy::InterestsBased,
                        None,
                        "Recent course (no interest matches found)".to_string(),
                    )
                })
                .collect();
        }

        let course_map: HashMap<i64, &Course> =
            all_courses.iter().map(|course| (course.id, course)).collect();

        // Rank in catalog order so equal scores keep it
        let mut ranked: Vec<(i64, InterestMatch)> = all_courses
            .iter()
            .filter_map(|course| matches.remove(&course.id).map(|m| (course.id, m)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut recommendations = Vec::new();
        for (course_id, matched) in ranked {
            if recommendations.len() >= limit {
                break;
            }
            if enrolled.contains(&course_id) {
                continue;
            }

            if let Some(course) = course_map.get(&course_id) {
                let tags = all_tags.get(&course_id).cloned().unwrap_or_default();
                recommendations.push(
                    Recommendation::course(
                        (*course).clone(),
                        Strategy::InterestsBased,
                        Some(matched.score),
                        Self::reason(&matched),
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
            "Generating interest-based activity recommendations"
        );

        let activities = super::course_activities(self.platform.as_ref(), course_id).await;
        let interests = self.user_interests(user_id).await;

        if interests.is_empty() {
            tracing::info!(user_id, course_id, "No interests on file, using section order");
            return activities
                .into_iter()
                .take(limit)
                .map(|activity| {
                    Recommendation::activity(
                        activity,
                        Strategy::InterestsBased,
                        None,
                        "Suggested based on course structure".to_string(),
                    )
                })
                .collect();
        }

        let completed =
            super::completed_activity_ids(self.platform.as_ref(), user_id, course_id).await;
        let interest_text = interests
            .iter()
            .map(|interest| features::clean_text(interest))
            .collect::<Vec<_>>()
            .join(" ");

        let mut scored: Vec<(usize, InterestMatch)> = Vec::new();
        for (index, activity) in activities.iter().enumerate() {
            if completed.contains(&activity.id) {
                continue;
            }

            let content = features::activity_content(activity);
            if let Some(matched) = Self::match_item(&interests, &interest_text, &content, &[]) {
                scored.push((index, matched));
            }
        }

        scored.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut recommendations = Vec::new();
        for (index, matched) in scored.into_iter().take(limit) {
            recommendations.push(Recommendation::activity(
                activities[index].clone(),
                Strategy::InterestsBased,
                Some(matched.score),
                Self::reason(&matched),
            ));
        }

        // Top up with the remaining activities in section order
        if recommendations.len() < limit {
            let recommended: HashSet<i64> =
                recommendations.iter().map(|rec| rec.item.id()).collect();

            for activity in &activities {
                if recommended.contains(&activity.id) || completed.contains(&activity.id) {
                    continue;
                }
                recommendations.push(Recommendation::activity(
                    activity.clone(),
                    Strategy::InterestsBased,
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
