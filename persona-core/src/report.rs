use crate::types::{EmotionScores, TraitScores};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Net score per bipolar dimension; positive leans to the first pole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    #[serde(rename = "E vs I")]
    pub extraversion_introversion: f64,
    #[serde(rename = "S vs N")]
    pub sensing_intuition: f64,
    #[serde(rename = "T vs F")]
    pub thinking_feeling: f64,
    #[serde(rename = "J vs P")]
    pub judging_perceiving: f64,
}

/// Keyword-derived four-letter type with its supporting scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeIndicator {
    pub code: String,
    pub scores: DimensionScores,
    /// Raw per-pole scores ("E", "I", ...) after the karma adjustment.
    pub pole_scores: IndexMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityEmotionSummary {
    pub subreddit: String,
    pub average_emotions: EmotionScores,
    pub most_common_top_emotion: String,
    pub interactions_count: u64,
    /// Items that produced a non-empty emotion vector.
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassStatus {
    Completed,
    Failed { reason: String },
}

impl PassStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, PassStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub keyword_traits: PassStatus,
    pub big_five: PassStatus,
    pub community_emotions: PassStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub username: String,
    pub generated_at: DateTime<Utc>,
    pub type_indicator: TypeIndicator,
    pub big_five: TraitScores,
    /// Ranked by interaction count, highest first.
    pub community_emotions: Vec<CommunityEmotionSummary>,
    pub passes: PassSummary,
}
