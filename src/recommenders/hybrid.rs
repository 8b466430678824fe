//! Weighted blend of all other strategies.
//!
//! Each source's scores are min-max normalized to 0-1 before weighting, so
//! no single strategy dominates through its raw scale. Fallback entries that
//! carry no score contribute a fixed default instead.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::db::InterestSource;
use crate::models::{Recommendation, SourceContribution, Strategy};
use crate::services::LearningPlatform;

use super::{
    CollaborativeRecommender, ContentBasedRecommender, InterestsBasedRecommender,
    PopularRecommender, Recommender,
};

const CONTENT_BASED_WEIGHT: f64 = 0.25;
const COLLABORATIVE_WEIGHT: f64 = 0.25;
const POPULARITY_WEIGHT: f64 = 0.15;
const INTERESTS_BASED_WEIGHT: f64 = 0.35;

const MIN_RECOMMENDATION_SCORE: f64 = 0.1;
const DEFAULT_SCORE_VALUE: f64 = 0.5;

fn weight_for(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::ContentBased => CONTENT_BASED_WEIGHT,
        Strategy::Collaborative => COLLABORATIVE_WEIGHT,
        Strategy::Popular => POPULARITY_WEIGHT,
        Strategy::InterestsBased => INTERESTS_BASED_WEIGHT,
        Strategy::Hybrid => 0.0,
    }
}

fn phrase_for(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::InterestsBased => "matches your interests",
        Strategy::ContentBased => "has similar content to courses you're taking",
        Strategy::Collaborative => "is popular with similar users",
        Strategy::Popular => "is highly rated overall",
        Strategy::Hybrid => "is recommended",
    }
}

/// Min-max normalization of one source's scores to 0-1.
///
/// A source whose leading entry carries no score passes through unmodified;
/// its entries later contribute the default value instead. Within a scored
/// source, score-less entries normalize as zero. A flat source (max equals
/// min) normalizes everything to zero.
fn normalized_scores(recommendations: &[Recommendation]) -> Vec<Option<f64>> {
    let leading_is_scored = recommendations
        .first()
        .map(|rec| rec.score.is_some())
        .unwrap_or(false);
    if !leading_is_scored {
        return vec![None; recommendations.len()];
    }

    let scores: Vec<f64> = recommendations
        .iter()
        .map(|rec| rec.score.unwrap_or(0.0))
        .collect();

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max - min == 0.0 { 1.0 } else { max - min };

    scores
        .into_iter()
        .map(|score| Some((score - min) / range))
        .collect()
}

/// One item's accumulated state while merging sources
struct Blend {
    score: f64,
    sources: Vec<SourceContribution>,
    first_seen: Recommendation,
    order: usize,
}

/// Merges the per-source lists into one weighted ranking
fn combine(source_lists: Vec<(Strategy, Vec<Recommendation>)>, limit: usize) -> Vec<Recommendation> {
    let mut blended: HashMap<i64, Blend> = HashMap::new();
    let mut discovered = 0usize;

    for (strategy, recommendations) in source_lists {
        let weight = weight_for(strategy);
        let norms = normalized_scores(&recommendations);

        for (rec, norm) in recommendations.into_iter().zip(norms) {
            let source_score = norm.unwrap_or(DEFAULT_SCORE_VALUE);
            let contribution = SourceContribution {
                strategy,
                score: source_score,
                weighted: source_score * weight,
            };

            match blended.entry(rec.item.id()) {
                Entry::Occupied(mut occupied) => {
                    let blend = occupied.get_mut();
                    blend.score += contribution.weighted;
                    blend.sources.push(contribution);
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Blend {
                        score: contribution.weighted,
                        sources: vec![contribution],
                        first_seen: rec,
                        order: discovered,
                    });
                    discovered += 1;
                }
            }
        }
    }

    let mut ranked: Vec<Blend> = blended.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.order.cmp(&b.order))
    });

    let mut result = Vec::new();
    for blend in ranked {
        if result.len() >= limit {
            break;
        }
        if blend.score < MIN_RECOMMENDATION_SCORE {
            continue;
        }

        let interests_score = blend
            .sources
            .iter()
            .find(|source| source.strategy == Strategy::InterestsBased)
            .map(|source| source.score)
            .unwrap_or(0.0);

        // Keep the detailed interest explanation when it exists; otherwise
        // name the strongest weighted contributor
        let main_reason = if interests_score > 0.0
            && blend
                .first_seen
                .recommendation_reason
                .to_lowercase()
                .contains("interests")
        {
            blend.first_seen.recommendation_reason.clone()
        } else {
            let top = blend
                .sources
                .iter()
                .max_by(|a, b| {
                    a.weighted
                        .partial_cmp(&b.weighted)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|source| source.strategy)
                .unwrap_or(Strategy::Hybrid);
            format!("Primarily recommended because it {}", phrase_for(top))
        };

        let reason = format!("{} (hybrid score: {:.2})", main_reason, blend.score);

        result.push(Recommendation {
            item: blend.first_seen.item,
            strategy: Strategy::Hybrid,
            score: Some(blend.score),
            recommendation_reason: reason,
            tags: blend.first_seen.tags,
            sources: Some(blend.sources),
        });
    }

    result
}

pub struct HybridRecommender {
    content_based: ContentBasedRecommender,
    collaborative: CollaborativeRecommender,
    popularity: PopularRecommender,
    interests_based: InterestsBasedRecommender,
}

impl HybridRecommender {
    pub fn new(platform: Arc<dyn LearningPlatform>, profiles: Arc<dyn InterestSource>) -> Self {
        Self {
            content_based: ContentBasedRecommender::new(platform.clone()),
            collaborative: CollaborativeRecommender::new(platform.clone()),
            popularity: PopularRecommender::new(platform.clone()),
            interests_based: InterestsBasedRecommender::new(platform, profiles),
        }
    }
}

#[async_trait]
impl Recommender for HybridRecommender {
    async fn recommend_courses(&self, user_id: i64, limit: usize) -> Vec<Recommendation> {
        tracing::info!(user_id, "Generating hybrid course recommendations");

        // Over-fetch from each source so the blend has items to choose from
        let extended_limit = limit * 2;

        let (content, collaborative, popularity, interests) = tokio::join!(
            self.content_based.recommend_courses(user_id, extended_limit),
            self.collaborative.recommend_courses(user_id, extended_limit),
            self.popularity.recommend_courses(user_id, extended_limit),
            self.interests_based.recommend_courses(user_id, extended_limit),
        );

        let combined = combine(
            vec![
                (Strategy::ContentBased, content),
                (Strategy::Collaborative, collaborative),
                (Strategy::Popular, popularity),
                (Strategy::InterestsBased, interests),
            ],
            limit,
        );

        if combined.is_empty() {
            tracing::info!(user_id, "Empty hybrid blend, trying interest fallback");
            let interests = self.interests_based.recommend_courses(user_id, limit).await;
            if !interests.is_empty() {
                return interests;
            }
            return self.popularity.recommend_courses(user_id, limit).await;
        }

        combined
    }

    async fn recommend_activities(
        &self,
        user_id: i64,
        course_id: i64,
        limit: usize,
    ) -> Vec<Recommendation> {
        tracing::info!(user_id, course_id, "Generating hybrid activity recommendations");

        let extended_limit = limit * 2;

        let (content, collaborative, popularity, interests) = tokio::join!(
            self.content_based
                .recommend_activities(user_id, course_id, extended_limit),
            self.collaborative
                .recommend_activities(user_id, course_id, extended_limit),
            self.popularity
                .recommend_activities(user_id, course_id, extended_limit),
            self.interests_based
                .recommend_activities(user_id, course_id, extended_limit),
        );

        let combined = combine(
            vec![
                (Strategy::ContentBased, content),
                (Strategy::Collaborative, collaborative),
                (Strategy::Popular, popularity),
                (Strategy::InterestsBased, interests),
            ],
            limit,
        );

        if combined.is_empty() {
            tracing::info!(
                user_id,
                course_id,
                "Empty hybrid blend, trying interest fallback"
            );
            let interests = self
                .interests_based
                .recommend_activities(user_id, course_id, limit)
                .await;
            if !interests.is_empty() {
                return interests;
            }
            return self
                .content_based
                .recommend_activities(user_id, course_id, limit)
                .await;
        }

        combined
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::models::Course;

    fn course_rec(id: i64, strategy: Strategy, score: Option<f64>, reason: &str) -> Recommendation {
        let course = Course {
            id,
            fullname: format!("Course {}", id),
            summary: String::new(),
            category_id: 1,
            category_name: String::new(),
            time_created: 0,
        };
        Recommendation::course(course, strategy, score, reason.to_string())
    }

    #[test]
    fn test_normalized_scores_map_to_unit_range() {
        let recs = vec![
            course_rec(1, Strategy::Popular, Some(1.0), "r"),
            course_rec(2, Strategy::Popular, Some(3.0), "r"),
            course_rec(3, Strategy::Popular, Some(5.0), "r"),
        ];

        let norms = normalized_scores(&recs);
        assert_eq!(norms, vec![Some(0.0), Some(0.5), Some(1.0)]);
    }

    #[test]
    fn test_unit_range_scores_are_unchanged() {
        let recs = vec![
            course_rec(1, Strategy::Popular, Some(0.0), "r"),
            course_rec(2, Strategy::Popular, Some(0.25), "r"),
            course_rec(3, Strategy::Popular, Some(1.0), "r"),
        ];

        let norms = normalized_scores(&recs);
        assert_eq!(norms, vec![Some(0.0), Some(0.25), Some(1.0)]);
    }

    #[test]
    fn test_flat_scores_normalize_to_zero() {
        let recs = vec![
            course_rec(1, Strategy::Popular, Some(2.0), "r"),
            course_rec(2, Strategy::Popular, Some(2.0), "r"),
        ];

        let norms = normalized_scores(&recs);
        assert_eq!(norms, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_scoreless_source_passes_through() {
        let recs = vec![
            course_rec(1, Strategy::Collaborative, None, "fallback"),
            course_rec(2, Strategy::Collaborative, None, "fallback"),
        ];

        assert_eq!(normalized_scores(&recs), vec![None, None]);
    }

    #[test]
    fn test_combine_sums_weighted_contributions() {
        let combined = combine(
            vec![
                (
                    Strategy::Popular,
                    vec![
                        course_rec(5, Strategy::Popular, Some(4.0), "popular"),
                        course_rec(6, Strategy::Popular, Some(1.0), "popular"),
                    ],
                ),
                (
                    Strategy::InterestsBased,
                    vec![
                        course_rec(5, Strategy::InterestsBased, Some(3.0), "Matches your interests: rust (score: 3.00)"),
                        course_rec(7, Strategy::InterestsBased, Some(1.0), "Content related"),
                    ],
                ),
            ],
            10,
        );

        // Item 5 normalizes to 1.0 in both sources
        assert_eq!(combined[0].item.id(), 5);
        let score = combined[0].score.unwrap();
        assert!((score - (POPULARITY_WEIGHT + INTERESTS_BASED_WEIGHT)).abs() < 1e-9);

        let sources = combined[0].sources.as_ref().unwrap();
        assert_eq!(sources.len(), 2);
        assert!(combined[0].strategy == Strategy::Hybrid);
    }

    #[test]
    fn test_combine_keeps_interest_explanation() {
        let combined = combine(
            vec![(
                Strategy::InterestsBased,
                vec![
                    course_rec(5, Strategy::InterestsBased, Some(3.0), "Matches your interests: rust (score: 3.00)"),
                    course_rec(6, Strategy::InterestsBased, Some(1.0), "Content related to your interests (score: 1.00)"),
                ],
            )],
            10,
        );

        assert!(combined[0]
            .recommendation_reason
            .starts_with("Matches your interests: rust"));
        assert!(combined[0].recommendation_reason.contains("hybrid score"));
    }

    #[test]
    fn test_zero_limit_yields_nothing() {
        let combined = combine(
            vec![(
                Strategy::Popular,
                vec![
                    course_rec(5, Strategy::Popular, Some(4.0), "r"),
                    course_rec(6, Strategy::Popular, Some(1.0), "r"),
                ],
            )],
            0,
        );
        assert!(combined.is_empty());
    }

    #[test]
    fn test_combine_drops_items_below_minimum() {
        // Single flat source: normalized score zero, weighted zero
        let combined = combine(
            vec![(
                Strategy::Popular,
                vec![course_rec(5, Strategy::Popular, Some(2.0), "r")],
            )],
            10,
        );
        assert!(combined.is_empty());
    }

    #[test]
    fn test_scoreless_entries_contribute_default() {
        let combined = combine(
            vec![(
                Strategy::Collaborative,
                vec![course_rec(5, Strategy::Collaborative, None, "Recent course")],
            )],
            10,
        );

        assert_eq!(combined.len(), 1);
        let expected = DEFAULT_SCORE_VALUE * COLLABORATIVE_WEIGHT;
        assert!((combined[0].score.unwrap() - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sparse_platform_still_produces_ranked_output() {
        let mut platform = StubPlatform::default();
        platform.courses = vec![
            course(1, "Site", "", 0),
            course(10, "Only Course Around", "a short description here", 50),
            course(11, "Another Course Here", "a short description here", 100),
        ];

        let recommender = HybridRecommender::new(
            Arc::new(platform),
            Arc::new(StubProfiles::default()),
        );
        let recs = recommender.recommend_courses(1, 5).await;

        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.item.id() != 1));
        assert!(recs.iter().all(|r| r.strategy == Strategy::Hybrid));
        assert!(recs
            .iter()
            .all(|r| !r.recommendation_reason.is_empty()));
        // Ranking is monotonically non-increasing
        for pair in recs.windows(2) {
            assert!(pair[0].score.unwrap() >= pair[1].score.unwrap());
        }
    }
}
