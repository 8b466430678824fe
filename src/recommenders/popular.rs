//! Popularity strategy: enrollment volume blended with course recency, and
//! peer engagement counts for activities.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Course, Recommendation, Strategy};
use crate::services::LearningPlatform;

use super::Recommender;

const ENROLLMENT_WEIGHT: f64 = 0.8;
const RECENCY_WEIGHT: f64 = 0.2;
const MAX_ENROLLMENT_SCORE: f64 = 5.0;
const RECENCY_PERIOD_SECS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_SCORE: f64 = 2.0;

const COMPLETION_WEIGHT: f64 = 2.0;
const VIEW_WEIGHT: f64 = 1.0;
const MAX_ACTIVITY_SCORE: f64 = 5.0;

pub struct PopularRecommender {
    platform: Arc<dyn LearningPlatform>,
}

impl PopularRecommender {
    pub fn new(platform: Arc<dyn LearningPlatform>) -> Self {
        Self { platform }
    }

    /// Popularity score per non-site course, plus the enrollment counts
    /// backing the scores.
    ///
    /// Every course starts from a default score; courses created within the
    /// recency window blend in a recency factor, then enrollment volume is
    /// weighted in on top.
    async fn course_popularity(
        &self,
        all_courses: &[Course],
        now: i64,
    ) -> (HashMap<i64, f64>, HashMap<i64, usize>) {
        let mut scores: HashMap<i64, f64> = HashMap::new();

        for course in all_courses {
            if course.is_site_course() {
                continue;
            }

            let mut score = DEFAULT_SCORE;
            let age = now - course.time_created;
            if age < RECENCY_PERIOD_SECS {
                let recency_factor = 1.0 - age as f64 / RECENCY_PERIOD_SECS as f64;
                score = score * (1.0 - RECENCY_WEIGHT) + recency_factor * RECENCY_WEIGHT;
            }
            scores.insert(course.id, score);
        }

        let course_ids: Vec<i64> = scores.keys().copied().collect();
        let enrollments = self.platform.enrolled_users_batch(&course_ids).await;

        let mut counts = HashMap::new();
        for (course_id, users) in enrollments {
            counts.insert(course_id, users.len());

            if let Some(score) = scores.get_mut(&course_id) {
                let enrollment_score = (users.len() as f64 / 10.0).min(MAX_ENROLLMENT_SCORE);
                *score = enrollment_score * ENROLLMENT_WEIGHT + *score * RECENCY_WEIGHT;
            }
        }

        tracing::info!(course_count = scores.len(), "Calculated course popularity");
        (scores, counts)
    }

    /// Engagement score per activity in a course, normalized to 0-5 over
    /// completion and view counts across all enrolled users
    async fn activity_engagement(&self, course_id: i64) -> HashMap<i64, f64> {
        let enrolled = match self.platform.enrolled_users(course_id).await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(course_id, error = %e, "Failed to fetch enrolled users");
                return HashMap::new();
            }
        };

        if enrolled.is_empty() {
            tracing::info!(course_id, "No enrolled users for engagement scoring");
            return HashMap::new();
        }

        let user_ids: Vec<i64> = enrolled.iter().map(|user| user.id).collect();
        let reports = self.platform.completion_status_batch(&user_ids, course_id).await;

        let mut counts: HashMap<i64, f64> = HashMap::new();
        for report in reports.values() {
            for status in &report.statuses {
                if status.cmid == 0 {
                    continue;
                }
                if status.is_completed() {
                    *counts.entry(status.cmid).or_insert(0.0) += COMPLETION_WEIGHT;
                } else if status.viewed {
                    *counts.entry(status.cmid).or_insert(0.0) += VIEW_WEIGHT;
                }
            }
        }

        let max_count = counts.values().copied().fold(0.0_f64, f64::max);
        if max_count == 0.0 {
            return HashMap::new();
        }

        counts
            .into_iter()
            .map(|(activity_id, count)| (activity_id, count / max_count * MAX_ACTIVITY_SCORE))
            .collect()
    }
}

#[async_trait]
impl Recommender for PopularRecommender {
    async fn recommend_courses(&self, user_id: i64, limit: usize) -> Vec<Recommendation> {
        tracing::info!(user_id, "Generating popularity-based course recommendations");

        let all_courses = super::site_courses(self.platform.as_ref()).await;
        let enrolled = super::enrolled_course_ids(self.platform.as_ref(), user_id).await;
        let candidates = super::candidate_courses(&all_courses, &enrolled);

        let now = Utc::now().timestamp();
        let (scores, counts) = self.course_popularity(&all_courses, now).await;

        let mut scored: Vec<(Course, f64)> = candidates
            .into_iter()
            .map(|course| {
                let score = scores.get(&course.id).copied().unwrap_or(0.0);
                (course, score)
            })
            .collect();
        super::rank_descending(&mut scored);

        scored
            .into_iter()
            .take(limit)
            .map(|(course, score)| {
                let enrollment_count = counts.get(&course.id).copied().unwrap_or(0);
                let mut reason = format!(
                    "This course is popular (score: {:.2}) with {} enrollments",
                    score, enrollment_count
                );
                if now - course.time_created < RECENCY_PERIOD_SECS {
                    reason.push_str(" and is relatively new");
                }
                Recommendation::course(course, Strategy::Popular, Some(score), reason)
            })
            .collect()
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
            "Generating popularity-based activity recommendations"
        );

        let activities = super::course_activities(self.platform.as_ref(), course_id).await;
        let completed =
            super::completed_activity_ids(self.platform.as_ref(), user_id, course_id).await;
        let engagement = self.activity_engagement(course_id).await;

        let mut scored: Vec<_> = activities
            .into_iter()
            .filter(|activity| !completed.contains(&activity.id))
            .map(|activity| {
                let score = engagement.get(&activity.id).copied().unwrap_or(0.0);
                (activity, score)
            })
            .collect();
        super::rank_descending(&mut scored);

        scored
            .into_iter()
            .take(limit)
            .map(|(activity, score)| {
                let reason = format!(
                    "This activity is popular with other students (engagement score: {:.2})",
                    score
                );
                Recommendation::activity(activity, Strategy::Popular, Some(score), reason)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn platform() -> StubPlatform {
        let mut platform = StubPlatform::default();
        platform.courses = vec![
            course(1, "Site", "", 0),
            course(2, "Enrolled", "", 0),
            course(3, "Crowded", "", 0),
            course(4, "Quiet", "", 0),
        ];
        // Course 3 has three students, course 4 has one
        platform.enrollments.insert(100, vec![2]);
        platform.enrollments.insert(101, vec![2, 3]);
        platform.enrollments.insert(102, vec![3, 4]);
        platform.enrollments.insert(103, vec![3]);
        platform
    }

    #[tokio::test]
    async fn test_courses_exclude_site_and_enrolled() {
        let recommender = PopularRecommender::new(Arc::new(platform()));
        let recs = recommender.recommend_courses(100, 10).await;

        let ids: Vec<i64> = recs.iter().map(|r| r.item.id()).collect();
        assert!(!ids.contains(&1));
        assert!(!ids.contains(&2));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_enrollment_volume_drives_ranking() {
        let recommender = PopularRecommender::new(Arc::new(platform()));
        let recs = recommender.recommend_courses(100, 10).await;

        assert_eq!(recs[0].item.id(), 3);
        assert_eq!(recs[1].item.id(), 4);
        assert!(recs[0].score.unwrap() > recs[1].score.unwrap());
        assert!(recs[0].recommendation_reason.contains("3 enrollments"));
    }

    #[tokio::test]
    async fn test_recent_course_gets_recency_note() {
        let mut platform = platform();
        let now = Utc::now().timestamp();
        platform.courses.push(course(5, "Brand New", "", now - 60));

        let recommender = PopularRecommender::new(Arc::new(platform));
        let recs = recommender.recommend_courses(100, 10).await;

        let fresh = recs.iter().find(|r| r.item.id() == 5).unwrap();
        assert!(fresh.recommendation_reason.ends_with("and is relatively new"));
    }

    #[tokio::test]
    async fn test_limit_is_respected() {
        let recommender = PopularRecommender::new(Arc::new(platform()));
        let recs = recommender.recommend_courses(100, 1).await;
        assert_eq!(recs.len(), 1);
    }

    #[tokio::test]
    async fn test_activities_exclude_completed_and_rank_by_engagement() {
        let mut platform = platform();
        platform.contents.insert(
            3,
            vec![section(
                1,
                vec![
                    activity(10, "Reading", ""),
                    activity(11, "Quiz", ""),
                    activity(12, "Forum", ""),
                ],
            )],
        );
        // User 100 completed activity 10; peers complete 11 and view 12
        platform
            .completions
            .insert((100, 3), report(vec![status(10, 1, true)]));
        platform
            .completions
            .insert((101, 3), report(vec![status(11, 1, true), status(12, 0, true)]));
        platform
            .completions
            .insert((102, 3), report(vec![status(11, 1, true)]));

        let recommender = PopularRecommender::new(Arc::new(platform));
        let recs = recommender.recommend_activities(100, 3, 10).await;

        let ids: Vec<i64> = recs.iter().map(|r| r.item.id()).collect();
        assert_eq!(ids, vec![11, 12]);
        assert!(recs[0].score.unwrap() > recs[1].score.unwrap());
        assert_eq!(recs[0].score.unwrap(), MAX_ACTIVITY_SCORE);
    }
}
