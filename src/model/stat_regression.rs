//! Per-player statistics as noisy linear readouts of match performance.
//!
//! For a player in slot `j` of a match of length `len`, each statistic has a
//! latent value `y* ~ N(len·(w_own·p_j + w_opp·T/n), 1/(v·len))` where `T` is
//! the summed performance of the `n` opponents. The observed value is
//! `max(0, y*)`: a positive observation pins `y*` exactly, a zero only tells
//! us `y* <= 0`. Missing observations contribute nothing.

use std::ops::Add;

use crate::model::{
    constants::MIN_PRECISION,
    gaussian::Gaussian,
    hyperparameters::{GammaPrior, HyperPriors, StatParameters},
    outcome::MatchFactor,
    structures::{
        hyper_posterior::HyperPosterior,
        match_outcome_node::{MatchOutcomeNode, PlayerSlot}
    },
    truncated::truncate_non_positive
};

/// Coefficients of the latent stat mean on the match's performances.
pub fn projection(node: &MatchOutcomeNode, slot: usize, params: &StatParameters) -> Vec<f64> {
    let mut a = vec![0.0; node.slots.len()];
    let opponents: Vec<usize> = node.opponents_of(slot).collect();

    a[slot] = node.length * params.own_weight;
    if !opponents.is_empty() {
        let share = node.length * params.opponent_weight / opponents.len() as f64;
        for k in opponents {
            a[k] = share;
        }
    }

    a
}

pub fn noise_variance(length: f64, params: &StatParameters) -> f64 {
    1.0 / (params.noise * length)
}

/// Site for a positive observation.
pub fn observation_site(y: f64, length: f64, params: &StatParameters) -> Gaussian {
    Gaussian::from_moments(y, noise_variance(length, params))
}

pub fn is_censored(slot: &PlayerSlot, stat: usize) -> bool {
    matches!(slot.stats.get(stat).copied().flatten(), Some(y) if y <= 0.0)
}

/// Moments of the projection `h` under `N(h; mean, variance)·P(h + ε <= 0)`
/// with `ε ~ N(0, noise_variance)`.
pub fn censored_tilt(noise_variance: f64) -> impl Fn(f64, f64) -> (f64, f64) {
    move |mean, variance| {
        let total = variance + noise_variance;
        let (latent_mean, latent_variance) = truncate_non_positive(mean, total);
        let gain = variance / total;

        (
            mean + gain * (latent_mean - mean),
            variance - gain * gain * (total - latent_variance)
        )
    }
}

/// Moments of the projection with the censored site taken out. While the
/// weights are zero the projection is the point `0` and there is no site to
/// remove.
fn censored_cavity((mean, variance): (f64, f64), site: Gaussian) -> (f64, f64) {
    if variance <= MIN_PRECISION {
        return (mean, 0.0);
    }

    let cavity = (Gaussian::from_moments(mean, variance) / site).clamped();
    if cavity.is_proper() {
        (cavity.mean(), cavity.variance())
    } else {
        (mean, variance)
    }
}

/// Sufficient statistics of the length-weighted regression of a statistic on
/// `(own performance, mean opponent performance)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegressionStatistics {
    pub gram: [[f64; 2]; 2],
    pub moment: [f64; 2],
    pub target_sq: f64,
    pub count: f64
}

impl RegressionStatistics {
    pub fn merge(self, other: RegressionStatistics) -> RegressionStatistics {
        self + other
    }
}

impl Add for RegressionStatistics {
    type Output = RegressionStatistics;

    fn add(self, rhs: RegressionStatistics) -> RegressionStatistics {
        let mut gram = self.gram;
        for (row, other) in gram.iter_mut().zip(rhs.gram) {
            row[0] += other[0];
            row[1] += other[1];
        }

        RegressionStatistics {
            gram,
            moment: [self.moment[0] + rhs.moment[0], self.moment[1] + rhs.moment[1]],
            target_sq: self.target_sq + rhs.target_sq,
            count: self.count + rhs.count
        }
    }
}

/// Accumulates one match's contribution for statistic `stat`.
///
/// Scaling the features by `len^(3/2)` and the target by `len^(1/2)` turns
/// the model into an ordinary regression with noise precision `v`.
pub fn regression_statistics(factor: &MatchFactor, stat: usize, params: &StatParameters) -> RegressionStatistics {
    let mut statistics = RegressionStatistics::default();
    let posterior = match factor.posterior() {
        Some(posterior) => posterior,
        None => return statistics
    };

    let node = &factor.node;
    let length = node.length;
    let noise = noise_variance(length, params);

    for (j, slot) in node.slots.iter().enumerate() {
        let y = match slot.stats.get(stat).copied().flatten() {
            Some(y) => y,
            None => continue
        };

        let opponents: Vec<usize> = node.opponents_of(j).collect();
        let n = opponents.len().max(1) as f64;
        let own_mean = posterior.mean(j);
        let opponent_mean = opponents.iter().map(|&k| posterior.mean(k)).sum::<f64>() / n;
        let own_variance = posterior.covariance(j, j);
        let cross = opponents.iter().map(|&k| posterior.covariance(j, k)).sum::<f64>() / n;
        let opponent_variance = opponents
            .iter()
            .flat_map(|&k| opponents.iter().map(move |&l| (k, l)))
            .map(|(k, l)| posterior.covariance(k, l))
            .sum::<f64>()
            / (n * n);

        let (target_mean, target_sq) = if y > 0.0 {
            (y, y * y)
        } else {
            let a = projection(node, j, params);
            let (h_mean, h_variance) = censored_cavity(posterior.projected(&a), factor.stat_site(j, stat));
            let (mean, variance) = truncate_non_positive(h_mean, h_variance + noise);
            (mean, mean * mean + variance)
        };

        let cube = length * length * length;
        let square = length * length;
        statistics.gram[0][0] += cube * (own_mean * own_mean + own_variance);
        statistics.gram[0][1] += cube * (own_mean * opponent_mean + cross);
        statistics.gram[1][0] += cube * (own_mean * opponent_mean + cross);
        statistics.gram[1][1] += cube * (opponent_mean * opponent_mean + opponent_variance);
        statistics.moment[0] += square * own_mean * target_mean;
        statistics.moment[1] += square * opponent_mean * target_mean;
        statistics.target_sq += length * target_sq;
        statistics.count += 1.0;
    }

    statistics
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatFit {
    pub parameters: StatParameters,
    pub own_weight: HyperPosterior,
    pub opponent_weight: HyperPosterior,
    pub noise: GammaPrior
}

/// Posterior of the regression weights given the current noise precision,
/// then of the noise precision given the new weights.
pub fn fit(statistics: &RegressionStatistics, current: &StatParameters, priors: &HyperPriors) -> StatFit {
    let v = current.noise;
    let prior = priors.stat_weight;
    let g = statistics.gram;
    let m = statistics.moment;

    let a = [
        [v * g[0][0] + prior.precision, v * g[0][1]],
        [v * g[1][0], v * g[1][1] + prior.precision]
    ];
    let b = [v * m[0] + prior.precision * prior.mean, v * m[1] + prior.precision * prior.mean];
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];

    let (weights, variances) = if det.abs() > MIN_PRECISION {
        (
            [(a[1][1] * b[0] - a[0][1] * b[1]) / det, (a[0][0] * b[1] - a[1][0] * b[0]) / det],
            [a[1][1] / det, a[0][0] / det]
        )
    } else {
        (
            [current.own_weight, current.opponent_weight],
            [1.0 / prior.precision, 1.0 / prior.precision]
        )
    };

    let explained = weights[0] * m[0] + weights[1] * m[1];
    let quadratic = weights[0] * weights[0] * g[0][0]
        + 2.0 * weights[0] * weights[1] * g[0][1]
        + weights[1] * weights[1] * g[1][1];
    let residual_sq = statistics.target_sq - 2.0 * explained + quadratic;
    let noise = priors.stat_noise.observe(statistics.count, residual_sq);

    StatFit {
        parameters: StatParameters {
            own_weight: weights[0],
            opponent_weight: weights[1],
            noise: noise.mean()
        },
        own_weight: HyperPosterior::Gaussian {
            mean: weights[0],
            variance: variances[0]
        },
        opponent_weight: HyperPosterior::Gaussian {
            mean: weights[1],
            variance: variances[1]
        },
        noise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        hyperparameters::Hyperparameters,
        structures::{
            batch_player_record::BatchPlayerRecord, chain_direction::ChainDirection,
            match_outcome_node::PlayerSlot, skill_belief::SkillBelief
        },
        timeline::SkillChain,
        truncated
    };
    use approx::assert_abs_diff_eq;
    use chrono::DateTime;

    fn node() -> MatchOutcomeNode {
        let slots = (0..4)
            .map(|i| PlayerSlot {
                player: i,
                position: 0,
                team: i / 2,
                stats: vec![Some(3.0)]
            })
            .collect();

        MatchOutcomeNode {
            match_id: 1,
            slots,
            winner: 0,
            length: 2.0
        }
    }

    /// A factor over `node()` with the given observations, updated once
    /// against fresh chains.
    fn updated_factor(observations: [Option<f64>; 4], hyper: &Hyperparameters) -> MatchFactor {
        let date = DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap();
        let chains: Vec<SkillChain> = (0..4)
            .map(|index| {
                let record = BatchPlayerRecord {
                    index,
                    player_id: index as i32,
                    prior: SkillBelief::new(1500.0 + 100.0 * index as f64, 200.0 * 200.0),
                    lapses: vec![0.0],
                    dates: vec![date]
                };
                let mut chain = SkillChain::new(&record, ChainDirection::Forward);
                chain.add_appearance(0, index);
                chain
            })
            .collect();

        let mut node = node();
        for (slot, y) in node.slots.iter_mut().zip(observations) {
            slot.stats = vec![y];
        }
        let mut factor = MatchFactor::new(node, 1);
        factor.update(&chains, hyper, 1.0);
        factor
    }

    fn params() -> StatParameters {
        StatParameters {
            own_weight: 1.0,
            opponent_weight: -0.5,
            noise: 4.0
        }
    }

    #[test]
    fn test_projection() {
        let a = projection(&node(), 1, &params());

        assert_eq!(a, vec![0.0, 2.0, -0.5, -0.5]);
    }

    #[test]
    fn test_observation_site_shrinks_with_length() {
        let short = observation_site(5.0, 1.0, &params());
        let long = observation_site(5.0, 10.0, &params());

        assert_abs_diff_eq!(short.mean(), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(short.variance(), 0.25, epsilon = 1e-12);
        assert!(long.variance() < short.variance());
    }

    #[test]
    fn test_censored_tilt_without_noise_is_truncation() {
        let (mean, variance) = censored_tilt(0.0)(1.0, 4.0);
        let (expected_mean, expected_variance) = truncated::truncate_non_positive(1.0, 4.0);

        assert_abs_diff_eq!(mean, expected_mean, epsilon = 1e-12);
        assert_abs_diff_eq!(variance, expected_variance, epsilon = 1e-12);
    }

    #[test]
    fn test_censored_tilt_pulls_down() {
        let (mean, variance) = censored_tilt(1.0)(0.5, 1.0);

        assert!(mean < 0.5);
        assert!(variance < 1.0 && variance > 0.0);
    }

    #[test]
    fn test_is_censored() {
        let slot = PlayerSlot {
            player: 0,
            position: 0,
            team: 0,
            stats: vec![Some(0.0), Some(2.0), None]
        };

        assert!(is_censored(&slot, 0));
        assert!(!is_censored(&slot, 1));
        assert!(!is_censored(&slot, 2));
        assert!(!is_censored(&slot, 3));
    }

    #[test]
    fn test_fit_recovers_exact_weights() {
        // y = 2·x_own + 1·x_opp with unit lengths and noiseless features
        let features = [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (2.0, -1.0)];
        let mut statistics = RegressionStatistics::default();
        for (own, opp) in features {
            let y: f64 = 2.0 * own + opp;
            statistics = statistics
                + RegressionStatistics {
                    gram: [[own * own, own * opp], [own * opp, opp * opp]],
                    moment: [own * y, opp * y],
                    target_sq: y * y,
                    count: 1.0
                };
        }

        let current = StatParameters {
            own_weight: 0.0,
            opponent_weight: 0.0,
            noise: 1.0e6
        };
        let fit = fit(&statistics, &current, &HyperPriors::default());

        assert_abs_diff_eq!(fit.parameters.own_weight, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.parameters.opponent_weight, 1.0, epsilon = 1e-6);
        // Residuals vanish, so the noise posterior only moves its shape
        assert!(fit.noise.shape > HyperPriors::default().stat_noise.shape);
        assert_abs_diff_eq!(fit.noise.rate, HyperPriors::default().stat_noise.rate, epsilon = 1e-3);
    }

    #[test]
    fn test_zero_weights_with_censored_observations_stay_finite() {
        let schema = vec!["kills".to_string()];
        let hyper = Hyperparameters::from_priors(&HyperPriors::default(), &schema);
        assert_eq!(hyper.stats[0].own_weight, 0.0);

        let factor = updated_factor([Some(0.0), Some(0.0), Some(4.0), Some(0.0)], &hyper);
        let statistics = regression_statistics(&factor, 0, &hyper.stats[0]);

        assert_eq!(statistics.count, 4.0);
        assert!(statistics.target_sq.is_finite() && statistics.target_sq > 16.0 * 2.0);
        assert!(statistics.moment.iter().all(|m| m.is_finite()));

        let fit = fit(&statistics, &hyper.stats[0], &HyperPriors::default());
        assert!(fit.parameters.own_weight.is_finite());
        assert!(fit.parameters.opponent_weight.is_finite());
        assert!(fit.parameters.noise.is_finite() && fit.parameters.noise > 0.0);
        assert!(fit.noise.rate > HyperPriors::default().stat_noise.rate);
    }

    #[test]
    fn test_missing_observations_are_not_counted() {
        let schema = vec!["kills".to_string()];
        let hyper = Hyperparameters::from_priors(&HyperPriors::default(), &schema);

        let complete = updated_factor([Some(3.0), Some(1.0), Some(0.0), Some(2.0)], &hyper);
        let partial = updated_factor([Some(3.0), None, Some(0.0), None], &hyper);
        let empty = updated_factor([None; 4], &hyper);

        assert_eq!(regression_statistics(&complete, 0, &hyper.stats[0]).count, 4.0);
        let statistics = regression_statistics(&partial, 0, &hyper.stats[0]);
        assert_eq!(statistics.count, 2.0);
        // The positive observation contributes y² scaled by the length
        assert!(statistics.target_sq >= 2.0 * 9.0);
        assert_eq!(regression_statistics(&empty, 0, &hyper.stats[0]), RegressionStatistics::default());
    }

    #[test]
    fn test_fit_without_observations_keeps_priors() {
        let priors = HyperPriors::default();
        let fit = fit(&RegressionStatistics::default(), &params(), &priors);

        assert_abs_diff_eq!(fit.parameters.own_weight, priors.stat_weight.mean);
        assert_abs_diff_eq!(fit.parameters.noise, priors.stat_noise.mean());
    }
}
