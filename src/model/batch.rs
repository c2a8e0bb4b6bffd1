use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use tracing::warn;

use crate::model::{
    config::InferenceConfig,
    constants::SECONDS_PER_DAY,
    error::{MatchError, ProcessingError},
    skill_store::SkillStore,
    structures::{
        batch_player_record::BatchPlayerRecord,
        malformed_match_policy::MalformedMatchPolicy,
        match_outcome_node::{MatchOutcomeNode, PlayerSlot},
        match_record::{Match, PlayerId},
        processing::SkippedMatch
    }
};

/// Fractional days from `from` to `to`. Negative if `to` is earlier.
pub fn days_between(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

/// A slice of matches resolved to batch-local indices.
///
/// `players` is keyed by global id in order of first appearance, so the
/// batch-local index of a player is its position in the map.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub players: IndexMap<PlayerId, BatchPlayerRecord>,
    pub nodes: Vec<MatchOutcomeNode>,
    pub skipped: Vec<SkippedMatch>,
    /// Number of negative lapses clamped to zero
    pub clamped_lapses: usize,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>
}

impl Batch {
    /// Resolves `matches`, expected in (date, id) order, against the store.
    ///
    /// Each match is validated before any of its players get an index, so a
    /// skipped match leaves no trace in the batch.
    pub fn assemble(
        index: usize,
        matches: &[Match],
        store: &SkillStore,
        config: &InferenceConfig
    ) -> Result<Batch, ProcessingError> {
        let mut batch = Batch {
            index,
            players: IndexMap::new(),
            nodes: Vec::with_capacity(matches.len()),
            skipped: Vec::new(),
            clamped_lapses: 0,
            start: None,
            end: None
        };
        let mut last_played: HashMap<PlayerId, DateTime<FixedOffset>> = HashMap::new();

        for m in matches {
            let winner = match validate(m, config) {
                Ok(winner) => winner,
                Err(e) => match config.malformed_match_policy {
                    MalformedMatchPolicy::Skip => {
                        warn!(match_id = m.id, reason = %e, "Skipping malformed match");
                        batch.skipped.push(SkippedMatch {
                            match_id: m.id,
                            reason: e.to_string()
                        });
                        continue;
                    }
                    MalformedMatchPolicy::Fail => return Err(e.into())
                }
            };

            let mut slots = Vec::with_capacity(2 * config.team_size);
            for (team, roster) in m.rosters.values().enumerate() {
                for player_id in roster {
                    let previous = last_played
                        .get(player_id)
                        .copied()
                        .or_else(|| store.last_played(*player_id));
                    let lapse = match previous {
                        Some(previous) => batch.lapse(*player_id, m.id, previous, m.date),
                        None => 0.0
                    };

                    let next_index = batch.players.len();
                    let record = batch.players.entry(*player_id).or_insert_with(|| BatchPlayerRecord {
                        index: next_index,
                        player_id: *player_id,
                        prior: store.prior_for(*player_id, m.date, config),
                        lapses: Vec::new(),
                        dates: Vec::new()
                    });

                    slots.push(PlayerSlot {
                        player: record.index,
                        position: record.lapses.len(),
                        team,
                        stats: m.player_stats(*player_id, config.stat_schema.len())
                    });
                    record.lapses.push(lapse);
                    record.dates.push(m.date);
                    last_played.insert(*player_id, m.date);
                }
            }

            batch.nodes.push(MatchOutcomeNode {
                match_id: m.id,
                slots,
                winner,
                length: m.length
            });

            batch.start = Some(batch.start.map_or(m.date, |start| start.min(m.date)));
            batch.end = Some(batch.end.map_or(m.date, |end| end.max(m.date)));
        }

        Ok(batch)
    }

    fn lapse(
        &mut self,
        player_id: PlayerId,
        match_id: i32,
        previous: DateTime<FixedOffset>,
        date: DateTime<FixedOffset>
    ) -> f64 {
        let lapse = days_between(previous, date);
        if lapse < 0.0 {
            warn!(player_id, match_id, lapse, "Negative time lapse, clamping to zero");
            self.clamped_lapses += 1;
            return 0.0;
        }

        lapse
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }
}

/// Checks the shape of a match and returns the index of the winning roster.
pub fn validate(m: &Match, config: &InferenceConfig) -> Result<usize, MatchError> {
    if m.rosters.len() != 2 {
        return Err(MatchError::RosterCount {
            match_id: m.id,
            found: m.rosters.len()
        });
    }

    for (roster_id, roster) in &m.rosters {
        if roster.len() != config.team_size {
            return Err(MatchError::RosterSize {
                match_id: m.id,
                roster_id: *roster_id,
                found: roster.len(),
                expected: config.team_size
            });
        }
    }

    let winner = m.winner_index().ok_or(MatchError::UnknownWinner {
        match_id: m.id,
        winner: m.winner
    })?;

    let mut seen = HashSet::new();
    for player_id in m.player_ids() {
        if !seen.insert(*player_id) {
            return Err(MatchError::DuplicatePlayer {
                match_id: m.id,
                player_id: *player_id
            });
        }
    }

    if config.stats_enabled() {
        if !(m.length > 0.0) {
            return Err(MatchError::NonPositiveLength {
                match_id: m.id,
                length: m.length
            });
        }

        for player_id in m.player_ids() {
            let found = m.stats.get(player_id).map_or(0, Vec::len);
            if found > config.stat_schema.len() {
                return Err(MatchError::StatLength {
                    match_id: m.id,
                    player_id: *player_id,
                    found,
                    expected: config.stat_schema.len()
                });
            }

            let values = m.stats.get(player_id).into_iter().flatten().flatten();
            if let Some(value) = values.copied().find(|y| !(y.is_finite() && *y >= 0.0)) {
                return Err(MatchError::InvalidStat {
                    match_id: m.id,
                    player_id: *player_id,
                    value
                });
            }
        }
    }

    Ok(winner)
}
