use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type PlayerId = i32;
pub type RosterId = i32;

/// A finished 5v5 match as supplied by the match history.
///
/// `rosters` keeps its input order, which defines roster index 0 and 1.
/// `stats` maps a player to one entry per configured statistic, `None`
/// marking a missing observation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Match {
    pub id: i32,
    pub date: DateTime<FixedOffset>,
    pub rosters: IndexMap<RosterId, Vec<PlayerId>>,
    pub winner: RosterId,
    #[serde(default)]
    pub tier: i32,
    /// Match length in minutes
    pub length: f64,
    #[serde(default)]
    pub stats: HashMap<PlayerId, Vec<Option<f64>>>
}

impl Match {
    /// Index of the winning roster, if the winner id names one of them.
    pub fn winner_index(&self) -> Option<usize> {
        self.rosters.get_index_of(&self.winner)
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.rosters.values().flatten()
    }

    /// Stat observations for a player, padded with `None` to `schema_len`.
    pub fn player_stats(&self, player_id: PlayerId, schema_len: usize) -> Vec<Option<f64>> {
        let mut observations = self.stats.get(&player_id).cloned().unwrap_or_default();
        observations.resize(schema_len, None);

        observations
    }
}
