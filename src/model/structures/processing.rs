use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::model::structures::{
    adjustment_type::AdjustmentType, hyper_posterior::HyperPosterior, match_record::PlayerId,
    skill_belief::SkillBelief
};

/// How a single inference run ended. Not converging is a reportable
/// outcome, not an error.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct InferenceReport {
    pub sweeps: usize,
    pub converged: bool,
    pub timed_out: bool,
    /// Mean per-node change of the last sweep, in mean plus standard deviation
    pub final_delta: f64,
    /// Largest relative hyperparameter change of the last sweep
    pub hyperparameter_delta: f64
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SkippedMatch {
    pub match_id: i32,
    pub reason: String
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub batch: usize,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub matches: usize,
    pub players: usize,
    pub skipped: Vec<SkippedMatch>,
    pub clamped_lapses: usize,
    pub inference: InferenceReport,
    /// Hyperparameter posteriors at the end of the batch
    pub hyperparameters: BTreeMap<String, HyperPosterior>
}

/// Per-player skill history of one batch, for auditing.
///
/// `players[i]` is the global id behind batch-local index `i`, and
/// `history[i][k]` is that player's posterior at chain position `k`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatchAudit {
    pub batch: usize,
    pub players: Vec<PlayerId>,
    pub dates: Vec<Vec<DateTime<FixedOffset>>>,
    pub history: Vec<Vec<SkillBelief>>
}

/// A change to a player's stored belief.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SkillAdjustment {
    pub player_id: PlayerId,
    pub batch: usize,
    pub adjustment_type: AdjustmentType,
    pub before: Option<SkillBelief>,
    pub after: SkillBelief,
    pub timestamp: DateTime<FixedOffset>
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ProcessorOutput {
    pub skills: BTreeMap<PlayerId, SkillBelief>,
    pub hyperparameters: BTreeMap<String, HyperPosterior>,
    pub batches: Vec<BatchReport>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<BatchAudit>
}
