/// A roster slot resolved to batch-local indices.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSlot {
    /// Batch-local player index
    pub player: usize,
    /// Position of this match within the player's chain
    pub position: usize,
    /// Roster index, 0 or 1
    pub team: usize,
    pub stats: Vec<Option<f64>>
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcomeNode {
    pub match_id: i32,
    /// Roster 0 slots followed by roster 1 slots
    pub slots: Vec<PlayerSlot>,
    /// Roster index of the winner
    pub winner: usize,
    pub length: f64
}

impl MatchOutcomeNode {
    /// +1.0 for winning slots and -1.0 for losing ones, so that the projection
    /// onto these signs is the winning margin.
    pub fn outcome_signs(&self) -> Vec<f64> {
        self.slots
            .iter()
            .map(|slot| if slot.team == self.winner { 1.0 } else { -1.0 })
            .collect()
    }

    pub fn opponents_of(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        let team = self.slots[slot].team;
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.team != team)
            .map(|(i, _)| i)
    }
}
