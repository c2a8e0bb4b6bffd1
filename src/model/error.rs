use thiserror::Error;

use crate::model::structures::match_record::{PlayerId, RosterId};

/// A match that cannot be placed into a batch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("match {match_id}: expected 2 rosters, found {found}")]
    RosterCount { match_id: i32, found: usize },

    #[error("match {match_id}: roster {roster_id} has {found} players, expected {expected}")]
    RosterSize {
        match_id: i32,
        roster_id: RosterId,
        found: usize,
        expected: usize
    },

    #[error("match {match_id}: winner {winner} is not one of the rosters")]
    UnknownWinner { match_id: i32, winner: RosterId },

    #[error("match {match_id}: player {player_id} appears more than once")]
    DuplicatePlayer { match_id: i32, player_id: PlayerId },

    #[error("match {match_id}: player {player_id} has {found} stats, expected at most {expected}")]
    StatLength {
        match_id: i32,
        player_id: PlayerId,
        found: usize,
        expected: usize
    },

    #[error("match {match_id}: player {player_id} has stat {value}, stats must be finite and non-negative")]
    InvalidStat {
        match_id: i32,
        player_id: PlayerId,
        value: f64
    },

    #[error("match {match_id}: length must be positive, found {length}")]
    NonPositiveLength { match_id: i32, length: f64 }
}

impl MatchError {
    pub fn match_id(&self) -> i32 {
        match self {
            MatchError::RosterCount { match_id, .. }
            | MatchError::RosterSize { match_id, .. }
            | MatchError::UnknownWinner { match_id, .. }
            | MatchError::DuplicatePlayer { match_id, .. }
            | MatchError::StatLength { match_id, .. }
            | MatchError::InvalidStat { match_id, .. }
            | MatchError::NonPositiveLength { match_id, .. } => *match_id
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("malformed match: {0}")]
    MalformedMatch(#[from] MatchError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String)
}
