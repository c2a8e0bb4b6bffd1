use std::collections::HashMap;

use chrono::Duration;
use itertools::Itertools;
use tracing::{debug, info};

use crate::{
    model::{
        batch::Batch,
        config::InferenceConfig,
        error::ProcessingError,
        hyperparameters::Hyperparameters,
        inference::infer,
        skill_store::SkillStore,
        structures::{
            match_record::{Match, PlayerId},
            processing::{BatchAudit, BatchReport, ProcessorOutput},
            skill_belief::SkillBelief
        },
        updater
    },
    utils::progress_utils::progress_bar
};

/// Runs batches of matches through assembly, inference and the online
/// updater, strictly one after another.
pub struct SkillProcessor {
    pub config: InferenceConfig,
    store: SkillStore,
    hyperparameters: Hyperparameters,
    reports: Vec<BatchReport>,
    history: Vec<BatchAudit>
}

impl SkillProcessor {
    pub fn new(config: InferenceConfig, priors: HashMap<PlayerId, SkillBelief>) -> Result<SkillProcessor, ProcessingError> {
        config.validate()?;
        let hyperparameters = Hyperparameters::from_priors(&config.priors, &config.stat_schema);

        Ok(SkillProcessor {
            store: SkillStore::with_priors(priors),
            hyperparameters,
            config,
            reports: Vec::new(),
            history: Vec::new()
        })
    }

    pub fn store(&self) -> &SkillStore {
        &self.store
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn reports(&self) -> &[BatchReport] {
        &self.reports
    }

    /// Splits `matches` into batches by the configured window and processes
    /// each of them in date order.
    pub fn process(&mut self, matches: &[Match]) -> Result<(), ProcessingError> {
        let batches = split_into_batches(matches, self.config.batch_days);
        let bar = progress_bar(batches.len() as u64, "Processing batches".to_string());

        for batch in &batches {
            self.process_batch(batch)?;
            bar.inc(1);
        }

        bar.finish();
        Ok(())
    }

    /// # Batch processing
    ///
    /// 1. Assemble the matches against the current store. Malformed matches
    ///     are skipped or abort the batch depending on the policy.
    /// 2. Run inference, starting from the previous batch's hyperparameters
    ///     or from their priors.
    /// 3. Write each player's latest posterior, decayed to the end of the
    ///     batch, back into the store.
    pub fn process_batch(&mut self, matches: &[Match]) -> Result<BatchReport, ProcessingError> {
        let index = self.reports.len();
        let batch = Batch::assemble(index, matches, &self.store, &self.config)?;

        let start = if self.config.warm_start {
            self.hyperparameters.clone()
        } else {
            Hyperparameters::from_priors(&self.config.priors, &self.config.stat_schema)
        };

        let result = infer(&batch, start, &self.config);
        updater::apply(&mut self.store, &batch, &result, &self.config);

        info!(
            batch = index,
            matches = batch.nodes.len(),
            players = batch.player_count(),
            skipped = batch.skipped.len(),
            sweeps = result.report.sweeps,
            converged = result.report.converged,
            "Processed batch"
        );
        debug!(
            batch = index,
            beta = result.hyperparameters.beta,
            gamma = result.hyperparameters.gamma,
            tau = result.hyperparameters.tau,
            offset = result.hyperparameters.offset,
            "Hyperparameter estimates"
        );

        if self.config.record_history {
            self.history.push(BatchAudit {
                batch: index,
                players: batch.player_ids(),
                dates: batch.players.values().map(|record| record.dates.clone()).collect(),
                history: result.history()
            });
        }

        let report = BatchReport {
            batch: index,
            start: batch.start,
            end: batch.end,
            matches: batch.nodes.len(),
            players: batch.player_count(),
            skipped: batch.skipped,
            clamped_lapses: batch.clamped_lapses,
            inference: result.report,
            hyperparameters: result.hyperparameters.posteriors.clone()
        };

        self.hyperparameters = result.hyperparameters;
        self.reports.push(report.clone());

        Ok(report)
    }

    pub fn output(&self) -> ProcessorOutput {
        ProcessorOutput {
            skills: self.store.skills(),
            hyperparameters: self.hyperparameters.posteriors.clone(),
            batches: self.reports.clone(),
            history: self.history.clone()
        }
    }
}

/// Orders matches by (date, id) and cuts them into consecutive windows of
/// `window_days`, each starting at its first match. Without a window every
/// match lands in one batch.
pub fn split_into_batches(matches: &[Match], window_days: Option<i64>) -> Vec<Vec<Match>> {
    let sorted: Vec<Match> = matches
        .iter()
        .sorted_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)))
        .cloned()
        .collect();

    if sorted.is_empty() {
        return Vec::new();
    }

    let window = match window_days {
        Some(days) => Duration::days(days),
        None => return vec![sorted]
    };

    let mut batches: Vec<Vec<Match>> = Vec::new();
    let mut current: Vec<Match> = Vec::new();
    for m in sorted {
        if let Some(first) = current.first() {
            if m.date >= first.date + window {
                batches.push(std::mem::take(&mut current));
            }
        }
        current.push(m);
    }
    batches.push(current);

    batches
}
