use crate::model::{structures::skill_belief::SkillBelief, truncated::cdf};

/// Probability that `team_a` beats `team_b` given their skill beliefs and a
/// performance precision `beta`.
///
/// Team performance is the sum of the members' performances, so the margin
/// is Gaussian with mean `Σμa − Σμb` and variance `Σσ² + (|a| + |b|)/β`.
pub fn win_probability(team_a: &[SkillBelief], team_b: &[SkillBelief], beta: f64) -> f64 {
    let mean: f64 = team_a.iter().map(|b| b.mean).sum::<f64>() - team_b.iter().map(|b| b.mean).sum::<f64>();
    let variance: f64 = team_a.iter().chain(team_b).map(|b| b.variance).sum::<f64>()
        + (team_a.len() + team_b.len()) as f64 / beta;

    if !(variance > 0.0) {
        return 0.5;
    }

    cdf(mean / variance.sqrt())
}
