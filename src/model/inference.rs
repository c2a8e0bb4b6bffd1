use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::model::{
    batch::Batch,
    config::InferenceConfig,
    hyperparameters::{self, Hyperparameters},
    outcome::MatchFactor,
    structures::{processing::InferenceReport, skill_belief::SkillBelief},
    timeline::SkillChain
};

pub struct InferenceResult {
    /// One chain per batch-local player index
    pub chains: Vec<SkillChain>,
    pub factors: Vec<MatchFactor>,
    pub hyperparameters: Hyperparameters,
    pub report: InferenceReport
}

impl InferenceResult {
    /// Posterior at every chain position, by batch-local index.
    pub fn history(&self) -> Vec<Vec<SkillBelief>> {
        self.chains
            .iter()
            .map(|chain| chain.marginals().iter().copied().map(SkillBelief::from).collect())
            .collect()
    }
}

/// Builds the chain arena and the match factors of a batch.
pub fn build_graph(batch: &Batch, config: &InferenceConfig) -> (Vec<SkillChain>, Vec<MatchFactor>) {
    let mut chains: Vec<SkillChain> = batch
        .players
        .values()
        .map(|record| SkillChain::new(record, config.direction))
        .collect();

    for (node_index, node) in batch.nodes.iter().enumerate() {
        for (slot_index, slot) in node.slots.iter().enumerate() {
            chains[slot.player].add_appearance(node_index, slot_index);
        }
    }

    let factors = batch
        .nodes
        .iter()
        .cloned()
        .map(|node| MatchFactor::new(node, config.stat_schema.len()))
        .collect();

    (chains, factors)
}

/// # Expectation propagation over one batch
///
/// Each sweep:
/// 1. Every match factor refines its sites against the skill marginals of
///    the previous sweep and sends new messages to its skills.
/// 2. Every chain collects those messages and is smoothed exactly.
/// 3. Optionally, the hyperparameters are re-estimated against the new
///    marginals and held fixed for the next sweep.
///
/// Both halves of a sweep read only what the other half wrote last, so
/// factors and chains are each updated in parallel. Iteration stops once the
/// mean change per skill node drops below `tolerance` and, when estimating,
/// no hyperparameter moved by more than `hyperparameter_tolerance`. It also
/// stops after `max_sweeps` or when the time budget runs out. With zero sweeps every node keeps the
/// supplied prior.
pub fn infer(batch: &Batch, hyperparameters: Hyperparameters, config: &InferenceConfig) -> InferenceResult {
    let (mut chains, mut factors) = build_graph(batch, config);
    let mut hyper = hyperparameters;
    let mut report = InferenceReport::default();

    let nodes: usize = chains.iter().map(SkillChain::len).sum();
    if nodes == 0 {
        report.converged = true;
    }

    let budget = config.time_budget();
    let started = Instant::now();
    let epsilon = config.lapse_epsilon;

    while nodes > 0 && report.sweeps < config.max_sweeps {
        factors
            .par_iter_mut()
            .for_each(|factor| factor.update(&chains, &hyper, config.damping));

        let delta: f64 = chains
            .par_iter_mut()
            .map(|chain| {
                chain.gather(&factors);
                chain.smooth(&hyper, epsilon)
            })
            .sum();

        if config.estimate_hyperparameters {
            let next = hyperparameters::estimate(&hyper, &chains, &factors, config);
            report.hyperparameter_delta = next.change_from(&hyper);
            hyper = next;
        }

        report.sweeps += 1;
        report.final_delta = delta / nodes as f64;
        debug!(
            batch = batch.index,
            sweep = report.sweeps,
            delta = report.final_delta,
            hyperparameter_delta = report.hyperparameter_delta,
            "Completed sweep"
        );

        if report.final_delta < config.tolerance && report.hyperparameter_delta < config.hyperparameter_tolerance {
            report.converged = true;
            break;
        }

        if budget.is_some_and(|budget| started.elapsed() >= budget) {
            report.timed_out = true;
            break;
        }
    }

    if !report.converged && report.sweeps > 0 {
        warn!(
            batch = batch.index,
            sweeps = report.sweeps,
            delta = report.final_delta,
            hyperparameter_delta = report.hyperparameter_delta,
            timed_out = report.timed_out,
            "Inference did not converge, keeping the latest marginals"
        );
    }

    InferenceResult {
        chains,
        factors,
        hyperparameters: hyper,
        report
    }
}
