use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Which end of a player's skill timeline carries the prior.
///
/// Chain positions are always chronological. `Forward` anchors the prior at
/// the earliest appearance and lets skill evolve forwards in time, `Backward`
/// anchors it at the most recent appearance and derives earlier nodes from
/// later ones.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChainDirection {
    #[default]
    Forward,
    Backward
}

impl ChainDirection {
    /// Position of the node that carries the prior in a chain of `len` nodes.
    pub fn anchor(&self, len: usize) -> usize {
        match self {
            ChainDirection::Forward => 0,
            ChainDirection::Backward => len.saturating_sub(1)
        }
    }
}
