use chrono::{DateTime, FixedOffset};

use crate::model::{
    batch::days_between, config::DecayConfig, structures::skill_belief::SkillBelief
};

/// # How this works
/// - A player last played at time T and we are looking at them at time D.
/// - The first `grace_days` of inactivity cost nothing.
/// - Every inactive day past that adds `variance_per_day` to the variance.
///   The mean never moves.
///
/// This is the total variance accrued over `days` of inactivity.
pub fn decay_variance(days: f64, config: &DecayConfig) -> f64 {
    config.variance_per_day * (days - config.grace_days).max(0.0)
}

/// Inflates `belief` for `days` of inactivity.
pub fn decay(belief: SkillBelief, days: f64, config: &DecayConfig) -> SkillBelief {
    grow(belief, decay_variance(days, config), config)
}

/// Decay owed by a player who was decayed up to `decayed_through` and is
/// next seen at `at`. Only the part of the inactivity not already charged
/// is added.
pub fn catch_up(
    belief: SkillBelief,
    last_played: DateTime<FixedOffset>,
    decayed_through: DateTime<FixedOffset>,
    at: DateTime<FixedOffset>,
    config: &DecayConfig
) -> SkillBelief {
    let owed = decay_variance(days_between(last_played, at), config);
    let charged = decay_variance(days_between(last_played, decayed_through), config);

    grow(belief, (owed - charged).max(0.0), config)
}

/// Adds `extra` variance, respecting the cap. The cap never shrinks a
/// belief that is already wider.
fn grow(belief: SkillBelief, extra: f64, config: &DecayConfig) -> SkillBelief {
    let mut variance = belief.variance + extra;
    if let Some(cap) = config.max_variance {
        variance = variance.min(cap.max(belief.variance));
    }

    SkillBelief::new(belief.mean, variance)
}
