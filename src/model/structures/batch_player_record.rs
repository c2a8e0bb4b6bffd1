use chrono::{DateTime, FixedOffset};

use crate::model::structures::{match_record::PlayerId, skill_belief::SkillBelief};

/// One player's slice of a batch.
///
/// `lapses[k]` is the number of days between appearance `k - 1` and `k`.
/// `lapses[0]` is the gap since the player's last appearance before this
/// batch, or 0.0 for a player never seen before.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlayerRecord {
    pub index: usize,
    pub player_id: PlayerId,
    pub prior: SkillBelief,
    pub lapses: Vec<f64>,
    pub dates: Vec<DateTime<FixedOffset>>
}

impl BatchPlayerRecord {
    pub fn chain_len(&self) -> usize {
        self.lapses.len()
    }
}
