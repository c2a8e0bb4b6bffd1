use crate::model::{
    gaussian::Gaussian,
    hyperparameters::{Hyperparameters, StatParameters},
    local_posterior::LocalPosterior,
    stat_regression,
    structures::match_outcome_node::MatchOutcomeNode,
    timeline::SkillChain,
    truncated::truncate_positive
};

/// Expected squared performance residuals `p - s` of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceStatistics {
    pub count: f64,
    pub sum_sq: f64
}

impl PerformanceStatistics {
    /// Statistics of `(skill cavity, performance message)` pairs under
    /// performance variance `noise`.
    pub fn from_evidence(evidence: &[(Gaussian, Gaussian)], noise: f64) -> PerformanceStatistics {
        PerformanceStatistics {
            count: evidence.len() as f64,
            sum_sq: evidence
                .iter()
                .map(|(cavity, up)| residual_second_moment(*cavity, *up, noise))
                .sum()
        }
    }
}

/// `E[(p - s)²]` when `s` follows the skill cavity, the residual is
/// `N(0, noise)` a priori and `up` is what the match sites say about `p`.
pub fn residual_second_moment(cavity: Gaussian, up: Gaussian, noise: f64) -> f64 {
    let denom = 1.0 + up.precision * (cavity.variance() + noise);
    let mean = noise * (up.precision_mean - up.precision * cavity.mean()) / denom;
    let variance = noise - noise * noise * up.precision / denom;

    mean * mean + variance
}

/// The factors attached to one match: the outcome constraint on the team
/// performances and, when enabled, the stat observations.
///
/// Every slot's performance is `p ~ N(s, 1/β)`. The winning roster's summed
/// performance must exceed the losing roster's, which is a truncation of the
/// projection of the performances onto the outcome signs. That site is
/// refined by moment matching against a local joint posterior over the
/// match's performances, together with any censored stat sites, and the
/// resulting per-slot performance messages are sent back to the skills.
#[derive(Debug, Clone)]
pub struct MatchFactor {
    pub node: MatchOutcomeNode,
    signs: Vec<f64>,
    outcome_site: Gaussian,
    /// Censored stat sites by slot, then stat
    stat_sites: Vec<Vec<Gaussian>>,
    /// Messages to the skill nodes
    skill_messages: Vec<Gaussian>,
    /// Skill cavities used in the last update
    cavities: Vec<Gaussian>,
    /// Messages from the match sites to the performances
    performance_messages: Vec<Gaussian>,
    posterior: Option<LocalPosterior>
}

impl MatchFactor {
    pub fn new(node: MatchOutcomeNode, stat_count: usize) -> MatchFactor {
        let slots = node.slots.len();

        MatchFactor {
            signs: node.outcome_signs(),
            node,
            outcome_site: Gaussian::uniform(),
            stat_sites: vec![vec![Gaussian::uniform(); stat_count]; slots],
            skill_messages: vec![Gaussian::uniform(); slots],
            cavities: vec![Gaussian::uniform(); slots],
            performance_messages: vec![Gaussian::uniform(); slots],
            posterior: None
        }
    }

    pub fn skill_message(&self, slot: usize) -> Gaussian {
        self.skill_messages[slot]
    }

    pub fn outcome_site(&self) -> Gaussian {
        self.outcome_site
    }

    pub fn stat_site(&self, slot: usize, stat: usize) -> Gaussian {
        self.stat_sites[slot][stat]
    }

    pub fn posterior(&self) -> Option<&LocalPosterior> {
        self.posterior.as_ref()
    }

    /// One expectation propagation pass over this match's sites, reading the
    /// skill marginals of the previous sweep.
    pub fn update(&mut self, chains: &[SkillChain], hyper: &Hyperparameters, damping: f64) {
        let performance_variance = hyper.performance_variance();

        for (j, slot) in self.node.slots.iter().enumerate() {
            let chain = &chains[slot.player];
            self.cavities[j] = (chain.marginal(slot.position) / self.skill_messages[j]).clamped();
        }
        if !self.cavities.iter().all(Gaussian::is_proper) {
            return;
        }

        let priors: Vec<Gaussian> = self
            .cavities
            .iter()
            .map(|cavity| cavity.shifted(0.0, performance_variance))
            .collect();
        let mut posterior = LocalPosterior::new(&priors);

        posterior.absorb(&self.signs, self.outcome_site);
        for (stat, params) in hyper.stats.iter().enumerate() {
            self.absorb_stat(&mut posterior, stat, params);
        }

        self.outcome_site = posterior.refine_site(&self.signs, self.outcome_site, damping, truncate_positive);
        for (stat, params) in hyper.stats.iter().enumerate() {
            self.refine_stat(&mut posterior, stat, params, damping);
        }

        for (j, prior) in priors.iter().enumerate() {
            let message = (posterior.marginal(j) / *prior).clamped();
            self.performance_messages[j] = message;
            self.skill_messages[j] = message.shifted(0.0, performance_variance);
        }

        self.posterior = Some(posterior);
    }

    fn absorb_stat(&self, posterior: &mut LocalPosterior, stat: usize, params: &StatParameters) {
        for (j, slot) in self.node.slots.iter().enumerate() {
            let projection = stat_regression::projection(&self.node, j, params);
            match slot.stats.get(stat).copied().flatten() {
                Some(y) if y > 0.0 => {
                    posterior.absorb(&projection, stat_regression::observation_site(y, self.node.length, params));
                }
                Some(_) => {
                    posterior.absorb(&projection, self.stat_sites[j][stat]);
                }
                None => {}
            }
        }
    }

    fn refine_stat(&mut self, posterior: &mut LocalPosterior, stat: usize, params: &StatParameters, damping: f64) {
        let noise_variance = stat_regression::noise_variance(self.node.length, params);

        for j in 0..self.node.slots.len() {
            if !stat_regression::is_censored(&self.node.slots[j], stat) {
                continue;
            }

            let projection = stat_regression::projection(&self.node, j, params);
            self.stat_sites[j][stat] = posterior.refine_site(
                &projection,
                self.stat_sites[j][stat],
                damping,
                stat_regression::censored_tilt(noise_variance)
            );
        }
    }

    /// The skill cavity and the performance message of every slot, or
    /// nothing before the first update.
    pub fn performance_evidence(&self) -> Vec<(Gaussian, Gaussian)> {
        if self.posterior.is_none() {
            return Vec::new();
        }

        self.cavities
            .iter()
            .copied()
            .zip(self.performance_messages.iter().copied())
            .collect()
    }

    /// Expected squared residuals `p - s` for every slot.
    pub fn performance_statistics(&self, hyper: &Hyperparameters) -> PerformanceStatistics {
        PerformanceStatistics::from_evidence(&self.performance_evidence(), hyper.performance_variance())
    }
}
