use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::{Activity, Course};

/// One scoring algorithm of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Popular,
    Collaborative,
    ContentBased,
    InterestsBased,
    Hybrid,
}

impl Strategy {
    /// All strategies exposed to callers, in registration order
    pub const ALL: [Strategy; 5] = [
        Strategy::Popular,
        Strategy::Collaborative,
        Strategy::ContentBased,
        Strategy::InterestsBased,
        Strategy::Hybrid,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Popular => "popular",
            Strategy::Collaborative => "collaborative",
            Strategy::ContentBased => "content-based",
            Strategy::InterestsBased => "interests-based",
            Strategy::Hybrid => "hybrid",
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "popular" => Ok(Strategy::Popular),
            "collaborative" => Ok(Strategy::Collaborative),
            "content-based" => Ok(Strategy::ContentBased),
            "interests-based" => Ok(Strategy::InterestsBased),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(AppError::UnknownStrategy(other.to_string())),
        }
    }
}

/// The entity a recommendation wraps
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RecommendedItem {
    Course(Course),
    Activity(Activity),
}

impl RecommendedItem {
    pub fn id(&self) -> i64 {
        match self {
            RecommendedItem::Course(c) => c.id,
            RecommendedItem::Activity(a) => a.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RecommendedItem::Course(c) => &c.fullname,
            RecommendedItem::Activity(a) => &a.name,
        }
    }
}

/// How much one strategy contributed to a hybrid score
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceContribution {
    pub strategy: Strategy,
    /// The source's normalized score for this entity
    pub score: f64,
    /// Score after applying the source weight
    pub weighted: f64,
}

/// A single ranked recommendation.
///
/// Immutable once built: the entity payload plus the provenance of its
/// ranking. List position is the relevance contract; `score` is absent for
/// fallback-ranked entries that carry no computed signal.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recommendation {
    #[serde(flatten)]
    pub item: RecommendedItem,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub recommendation_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceContribution>>,
}

impl Recommendation {
    pub fn course(course: Course, strategy: Strategy, score: Option<f64>, reason: String) -> Self {
        Self {
            item: RecommendedItem::Course(course),
            strategy,
            score,
            recommendation_reason: reason,
            tags: None,
            sources: None,
        }
    }

    pub fn activity(
        activity: Activity,
        strategy: Strategy,
        score: Option<f64>,
        reason: String,
    ) -> Self {
        Self {
            item: RecommendedItem::Activity(activity),
            strategy,
            score,
            recommendation_reason: reason,
            tags: None,
            sources: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        if !tags.is_empty() {
            self.tags = Some(tags);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_round_trip() {
        for strategy in Strategy::ALL {
            let parsed: Strategy = strategy.name().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let err = "random-forest".parse::<Strategy>().unwrap_err();
        assert!(err.to_string().contains("random-forest"));
    }

    #[test]
    fn test_recommendation_serializes_flat() {
        let course = Course {
            id: 42,
            fullname: "Databases".to_string(),
            summary: String::new(),
            category_id: 2,
            category_name: "CS".to_string(),
            time_created: 0,
        };

        let rec = Recommendation::course(
            course,
            Strategy::Popular,
            Some(3.5),
            "This course is popular".to_string(),
        );

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["fullname"], "Databases");
        assert_eq!(json["strategy"], "popular");
        assert_eq!(json["score"], 3.5);
        assert_eq!(json["recommendation_reason"], "This course is popular");
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_scoreless_recommendation_omits_score() {
        let activity = Activity {
            id: 9,
            name: "Quiz".to_string(),
            description: String::new(),
            mod_type: "quiz".to_string(),
        };

        let rec = Recommendation::activity(
            activity,
            Strategy::Collaborative,
            None,
            "Suggested activity (no collaborative data available)".to_string(),
        );

        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("score").is_none());
        assert!(!rec.recommendation_reason.is_empty());
    }
}
