use std::ops::Add;

use crate::model::{
    gaussian::Gaussian,
    hyperparameters::Hyperparameters,
    outcome::MatchFactor,
    structures::{
        batch_player_record::BatchPlayerRecord, chain_direction::ChainDirection, match_record::PlayerId,
        skill_belief::SkillBelief
    }
};

/// Expected squared residuals of every transition in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransitionStatistics {
    pub dynamics_count: f64,
    pub dynamics_sum_sq: f64,
    pub decay_count: f64,
    /// Sum of E[decay residual²] / lapse, i.e. normalised to one day
    pub decay_sum_sq: f64,
    pub offset_precision: f64,
    pub offset_precision_mean: f64
}

impl TransitionStatistics {
    pub fn merge(self, other: TransitionStatistics) -> TransitionStatistics {
        self + other
    }
}

impl Add for TransitionStatistics {
    type Output = TransitionStatistics;

    fn add(self, rhs: TransitionStatistics) -> TransitionStatistics {
        TransitionStatistics {
            dynamics_count: self.dynamics_count + rhs.dynamics_count,
            dynamics_sum_sq: self.dynamics_sum_sq + rhs.dynamics_sum_sq,
            decay_count: self.decay_count + rhs.decay_count,
            decay_sum_sq: self.decay_sum_sq + rhs.decay_sum_sq,
            offset_precision: self.offset_precision + rhs.offset_precision,
            offset_precision_mean: self.offset_precision_mean + rhs.offset_precision_mean
        }
    }
}

/// The skill timeline of one player within a batch.
///
/// Node `k` is the player's skill at their `k`-th appearance, in date order.
/// Consecutive nodes are linked by `s[k] ~ N(s[k - 1] + offset, 1/γ + lapse[k]/τ)`
/// and the prior is attached to the anchor node picked by the chain direction.
/// The chain is a tree, so smoothing it is exact: one forward and one
/// backward pass of Gaussian messages.
#[derive(Debug, Clone)]
pub struct SkillChain {
    pub index: usize,
    pub player_id: PlayerId,
    prior: Gaussian,
    anchor: usize,
    lapses: Vec<f64>,
    /// (match node, slot) per appearance
    appearances: Vec<(usize, usize)>,
    /// Messages from match factors into each node
    evidence: Vec<Gaussian>,
    /// Message into each node from the node before it
    from_left: Vec<Gaussian>,
    /// Message into each node from the node after it
    from_right: Vec<Gaussian>,
    marginals: Vec<Gaussian>
}

impl SkillChain {
    pub fn new(record: &BatchPlayerRecord, direction: ChainDirection) -> SkillChain {
        let len = record.chain_len();
        let prior = Gaussian::from(record.prior);

        SkillChain {
            index: record.index,
            player_id: record.player_id,
            prior,
            anchor: direction.anchor(len),
            lapses: record.lapses.clone(),
            appearances: Vec::with_capacity(len),
            evidence: vec![Gaussian::uniform(); len],
            from_left: vec![Gaussian::uniform(); len],
            from_right: vec![Gaussian::uniform(); len],
            marginals: vec![prior; len]
        }
    }

    /// Registers the match slot at the next chain position.
    pub fn add_appearance(&mut self, node: usize, slot: usize) {
        self.appearances.push((node, slot));
    }

    pub fn len(&self) -> usize {
        self.marginals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marginals.is_empty()
    }

    pub fn prior(&self) -> Gaussian {
        self.prior
    }

    pub fn marginal(&self, position: usize) -> Gaussian {
        self.marginals[position]
    }

    pub fn marginals(&self) -> &[Gaussian] {
        &self.marginals
    }

    /// The belief at the player's most recent appearance.
    pub fn latest(&self) -> SkillBelief {
        match self.marginals.last() {
            Some(marginal) => SkillBelief::from(*marginal),
            None => SkillBelief::from(self.prior)
        }
    }

    /// Marginal at `position` without the evidence of the match played there.
    pub fn cavity(&self, position: usize) -> Gaussian {
        (self.marginals[position] / self.evidence[position]).clamped()
    }

    /// Collects the current factor-to-skill messages of every appearance.
    pub fn gather(&mut self, factors: &[MatchFactor]) {
        for (position, (node, slot)) in self.appearances.iter().enumerate() {
            self.evidence[position] = factors[*node].skill_message(*slot);
        }
    }

    /// Product of every message into `position` except the chain neighbours.
    fn local(&self, position: usize) -> Gaussian {
        if position == self.anchor {
            self.evidence[position] * self.prior
        } else {
            self.evidence[position]
        }
    }

    /// Recomputes every marginal from the current evidence and returns the
    /// summed change in mean and standard deviation.
    pub fn smooth(&mut self, hyper: &Hyperparameters, epsilon: f64) -> f64 {
        let len = self.len();
        if len == 0 {
            return 0.0;
        }

        self.from_left[0] = Gaussian::uniform();
        for k in 1..len {
            let variance = hyper.transition_variance(self.lapses[k], epsilon);
            self.from_left[k] = (self.from_left[k - 1] * self.local(k - 1)).shifted(hyper.offset, variance);
        }

        self.from_right[len - 1] = Gaussian::uniform();
        for k in (0..len - 1).rev() {
            let variance = hyper.transition_variance(self.lapses[k + 1], epsilon);
            self.from_right[k] = (self.from_right[k + 1] * self.local(k + 1)).shifted(-hyper.offset, variance);
        }

        let mut delta = 0.0;
        for k in 0..len {
            let marginal = self.from_left[k] * self.local(k) * self.from_right[k];
            delta += marginal.distance(&self.marginals[k]);
            self.marginals[k] = marginal;
        }

        delta
    }

    /// Expected squared transition residuals under the current messages,
    /// split into their dynamics and decay parts.
    pub fn transition_statistics(&self, hyper: &Hyperparameters, epsilon: f64) -> TransitionStatistics {
        let mut statistics = TransitionStatistics::default();

        for k in 1..self.len() {
            let lapse = self.lapses[k];
            let dynamics = hyper.dynamics_variance();
            let decay = hyper.decay_variance(lapse, epsilon);
            let q = dynamics + decay;

            let before = self.from_left[k - 1] * self.local(k - 1);
            let after = self.from_right[k] * self.local(k);
            let (mean, variance) = match transition_residual(before, after, hyper.offset, q) {
                Some(moments) => moments,
                None => continue
            };
            let second_moment = mean * mean + variance;

            let shared = dynamics * decay / q;
            let dynamics_share = dynamics / q;
            statistics.dynamics_count += 1.0;
            statistics.dynamics_sum_sq += dynamics_share * dynamics_share * second_moment + shared;

            if decay > 0.0 {
                let decay_share = decay / q;
                statistics.decay_count += 1.0;
                statistics.decay_sum_sq += (decay_share * decay_share * second_moment + shared) / lapse;
            }

            statistics.offset_precision += 1.0 / q;
            statistics.offset_precision_mean += (mean + hyper.offset) / q;
        }

        statistics
    }
}

/// Moments of `z = s[k] - s[k - 1] - offset` where `z ~ N(0, q)` a priori,
/// `before` is everything known about `s[k - 1]` and `after` everything known
/// about `s[k]` apart from the link itself.
fn transition_residual(before: Gaussian, after: Gaussian, offset: f64, q: f64) -> Option<(f64, f64)> {
    if before.is_proper() {
        let denom = 1.0 + after.precision * (before.variance() + q);
        let mean = q * (after.precision_mean - after.precision * (before.mean() + offset)) / denom;
        let variance = q - q * q * after.precision / denom;
        return Some((mean, variance));
    }

    if after.is_proper() {
        let denom = 1.0 + before.precision * (after.variance() + q);
        let mean = -q * (before.precision_mean - before.precision * (after.mean() - offset)) / denom;
        let variance = q - q * q * before.precision / denom;
        return Some((mean, variance));
    }

    None
}
