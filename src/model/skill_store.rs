use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap}
};

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{
    config::InferenceConfig,
    decay,
    structures::{match_record::PlayerId, processing::SkillAdjustment, skill_belief::SkillBelief}
};

/// A player's stored belief and bookkeeping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerSkill {
    pub player_id: PlayerId,
    pub belief: SkillBelief,
    pub last_played: DateTime<FixedOffset>,
    /// Inactivity decay has been applied up to this time
    pub decayed_through: DateTime<FixedOffset>,
    pub matches_played: usize,
    pub global_rank: usize,
    pub percentile: f64
}

/// The global skill store carried from batch to batch.
///
/// Read by the batch assembler, written only by the online updater once a
/// batch has finished.
#[derive(Debug, Clone, Default)]
pub struct SkillStore {
    // Sorted by mean, descending. Ranks and percentiles are kept in sync by `sort`.
    leaderboard: IndexMap<PlayerId, PlayerSkill>,
    // Priors for players not seen yet
    priors: HashMap<PlayerId, SkillBelief>,
    adjustments: HashMap<PlayerId, Vec<SkillAdjustment>>
}

impl SkillStore {
    pub fn new() -> SkillStore {
        SkillStore::default()
    }

    pub fn with_priors(priors: HashMap<PlayerId, SkillBelief>) -> SkillStore {
        SkillStore {
            priors,
            ..SkillStore::default()
        }
    }

    pub fn len(&self) -> usize {
        self.leaderboard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaderboard.is_empty()
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&PlayerSkill> {
        self.leaderboard.get(&player_id)
    }

    pub fn last_played(&self, player_id: PlayerId) -> Option<DateTime<FixedOffset>> {
        self.get(player_id).map(|skill| skill.last_played)
    }

    /// The prior for a player's first appearance in a batch at time `at`.
    ///
    /// Known players get their stored belief plus whatever decay accrued
    /// since the updater last charged it. Unknown players get their entry
    /// from the prior table, or the configured default.
    pub fn prior_for(&self, player_id: PlayerId, at: DateTime<FixedOffset>, config: &InferenceConfig) -> SkillBelief {
        if let Some(skill) = self.get(player_id) {
            return decay::catch_up(skill.belief, skill.last_played, skill.decayed_through, at, &config.decay);
        }

        self.priors
            .get(&player_id)
            .copied()
            .unwrap_or_else(|| SkillBelief::new(config.default_mean, config.default_variance))
    }

    /// Writes new beliefs and their adjustments, then re-ranks once.
    pub(crate) fn insert_or_update(&mut self, skills: Vec<PlayerSkill>, adjustments: Vec<SkillAdjustment>) {
        for skill in skills {
            self.leaderboard.insert(skill.player_id, skill);
        }

        self.sort();

        for adjustment in adjustments {
            self.adjustments.entry(adjustment.player_id).or_default().push(adjustment);
        }
    }

    pub fn adjustments(&self, player_id: PlayerId) -> Option<&Vec<SkillAdjustment>> {
        self.adjustments.get(&player_id)
    }

    /// Players ordered by mean skill, best first.
    pub fn leaderboard(&self) -> impl Iterator<Item = &PlayerSkill> {
        self.leaderboard.values()
    }

    pub fn skills(&self) -> BTreeMap<PlayerId, SkillBelief> {
        self.leaderboard
            .iter()
            .map(|(player_id, skill)| (*player_id, skill.belief))
            .collect()
    }

    fn sort(&mut self) {
        self.leaderboard.sort_by(|_, a, _, b| {
            b.belief
                .mean
                .partial_cmp(&a.belief.mean)
                .unwrap_or(Ordering::Equal)
                .then(a.player_id.cmp(&b.player_id))
        });

        let total = self.leaderboard.len();
        for (i, skill) in self.leaderboard.values_mut().enumerate() {
            skill.global_rank = i + 1;
            skill.percentile = SkillStore::percentile(i + 1, total).unwrap_or_default();
        }
    }

    /// `P = (n/N) * 100`, where `n` is the number of players ranked below
    fn percentile(rank: usize, total: usize) -> Option<f64> {
        if rank < 1 || rank > total {
            return None;
        }

        let n = total - rank;
        Some(n as f64 / total as f64 * 100.0)
    }
}
