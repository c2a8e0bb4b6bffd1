use tracing::debug;

use crate::model::{
    batch::{days_between, Batch},
    config::InferenceConfig,
    decay,
    inference::InferenceResult,
    skill_store::{PlayerSkill, SkillStore},
    structures::{adjustment_type::AdjustmentType, processing::SkillAdjustment}
};

/// Writes the outcome of a batch back into the store.
///
/// For every player in the batch, the posterior at their latest appearance
/// is decayed for the inactivity between that appearance and the end of the
/// batch, then stored as their new belief. This is the only place the store
/// is written.
pub fn apply(
    store: &mut SkillStore,
    batch: &Batch,
    result: &InferenceResult,
    config: &InferenceConfig
) -> Vec<SkillAdjustment> {
    let end = match batch.end {
        Some(end) => end,
        None => return Vec::new()
    };

    let mut skills = Vec::with_capacity(result.chains.len());
    let mut adjustments = Vec::new();

    for (chain, record) in result.chains.iter().zip(batch.players.values()) {
        let last_played = match record.dates.last() {
            Some(date) => *date,
            None => continue
        };
        let existing = store.get(record.player_id);

        if existing.is_none() {
            adjustments.push(SkillAdjustment {
                player_id: record.player_id,
                batch: batch.index,
                adjustment_type: AdjustmentType::Initial,
                before: None,
                after: record.prior,
                timestamp: record.dates[0]
            });
        }

        let posterior = chain.latest();
        adjustments.push(SkillAdjustment {
            player_id: record.player_id,
            batch: batch.index,
            adjustment_type: AdjustmentType::Match,
            before: Some(existing.map_or(record.prior, |skill| skill.belief)),
            after: posterior,
            timestamp: last_played
        });

        let decayed = decay::decay(posterior, days_between(last_played, end), &config.decay);
        if decayed != posterior {
            adjustments.push(SkillAdjustment {
                player_id: record.player_id,
                batch: batch.index,
                adjustment_type: AdjustmentType::Decay,
                before: Some(posterior),
                after: decayed,
                timestamp: end
            });
        }

        skills.push(PlayerSkill {
            player_id: record.player_id,
            belief: decayed,
            last_played,
            decayed_through: end,
            matches_played: existing.map_or(0, |skill| skill.matches_played) + record.chain_len(),
            global_rank: 0,
            percentile: 0.0
        });
    }

    debug!(batch = batch.index, players = skills.len(), "Updating skill store");
    store.insert_or_update(skills, adjustments.clone());

    adjustments
}
