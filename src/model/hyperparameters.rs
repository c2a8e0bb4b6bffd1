use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use tracing::{debug, warn};

use crate::model::{
    config::InferenceConfig,
    constants::{
        BETA_RATE, BETA_SHAPE, BISECTION_STEPS, BRACKET_STEPS, ESTIMATOR_ITERATIONS, ESTIMATOR_TOLERANCE,
        GAMMA_RATE, GAMMA_SHAPE, MIN_PRECISION, OFFSET_MEAN, OFFSET_PRECISION, STAT_NOISE_RATE, STAT_NOISE_SHAPE,
        STAT_WEIGHT_MEAN, STAT_WEIGHT_PRECISION, TAU_RATE, TAU_SHAPE
    },
    error::ProcessingError,
    gaussian::Gaussian,
    outcome::{MatchFactor, PerformanceStatistics},
    stat_regression::{self, RegressionStatistics},
    structures::hyper_posterior::HyperPosterior,
    timeline::{SkillChain, TransitionStatistics}
};

/// Gamma distribution over a precision, as (shape, rate).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GammaPrior {
    pub shape: f64,
    pub rate: f64
}

impl GammaPrior {
    pub fn new(shape: f64, rate: f64) -> GammaPrior {
        GammaPrior { shape, rate }
    }

    pub fn mean(&self) -> f64 {
        self.shape / self.rate
    }

    /// Posterior after `count` zero-mean Gaussian residuals whose expected
    /// squares sum to `sum_sq`. Non-finite statistics leave the prior as it is.
    pub fn observe(&self, count: f64, sum_sq: f64) -> GammaPrior {
        if !count.is_finite() || !sum_sq.is_finite() {
            warn!(count, sum_sq, "Ignoring non-finite residual statistics");
            return *self;
        }

        GammaPrior {
            shape: self.shape + 0.5 * count,
            rate: self.rate + 0.5 * sum_sq.max(0.0)
        }
    }

    fn is_valid(&self) -> bool {
        self.shape > 0.0 && self.rate > 0.0
    }
}

impl From<GammaPrior> for HyperPosterior {
    fn from(g: GammaPrior) -> HyperPosterior {
        HyperPosterior::Gamma {
            shape: g.shape,
            rate: g.rate
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GaussianPrior {
    pub mean: f64,
    pub precision: f64
}

impl GaussianPrior {
    pub fn new(mean: f64, precision: f64) -> GaussianPrior {
        GaussianPrior { mean, precision }
    }
}

/// Priors over the shared hyperparameters of a batch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HyperPriors {
    /// Performance precision (skill-class width)
    pub beta: GammaPrior,
    /// Per-match dynamics precision
    pub gamma: GammaPrior,
    /// Decay precision per day of lapse
    pub tau: GammaPrior,
    /// Skill drift added at every transition
    pub offset: GaussianPrior,
    /// Prior on every stat regression weight
    pub stat_weight: GaussianPrior,
    /// Prior on every stat noise precision
    pub stat_noise: GammaPrior
}

impl Default for HyperPriors {
    fn default() -> Self {
        Self {
            beta: GammaPrior::new(BETA_SHAPE, BETA_RATE),
            gamma: GammaPrior::new(GAMMA_SHAPE, GAMMA_RATE),
            tau: GammaPrior::new(TAU_SHAPE, TAU_RATE),
            offset: GaussianPrior::new(OFFSET_MEAN, OFFSET_PRECISION),
            stat_weight: GaussianPrior::new(STAT_WEIGHT_MEAN, STAT_WEIGHT_PRECISION),
            stat_noise: GammaPrior::new(STAT_NOISE_SHAPE, STAT_NOISE_RATE)
        }
    }
}

impl HyperPriors {
    pub fn validate(&self) -> Result<(), ProcessingError> {
        let gammas = [
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("tau", self.tau),
            ("stat_noise", self.stat_noise)
        ];
        for (name, prior) in gammas {
            if !prior.is_valid() {
                return Err(ProcessingError::InvalidConfig(format!(
                    "{} prior needs positive shape and rate",
                    name
                )));
            }
        }

        if !(self.offset.precision > 0.0) || !(self.stat_weight.precision > 0.0) {
            return Err(ProcessingError::InvalidConfig(
                "Gaussian priors need positive precision".to_string()
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum HyperParameter {
    Beta,
    Gamma,
    Tau,
    Offset
}

/// Point estimates for one statistic's regression.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct StatParameters {
    pub own_weight: f64,
    pub opponent_weight: f64,
    /// Noise precision per minute of match length
    pub noise: f64
}

impl StatParameters {
    pub fn from_priors(priors: &HyperPriors) -> StatParameters {
        StatParameters {
            own_weight: priors.stat_weight.mean,
            opponent_weight: priors.stat_weight.mean,
            noise: priors.stat_noise.mean()
        }
    }
}

/// The shared parameters of a batch, held fixed during a message sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Hyperparameters {
    pub beta: f64,
    pub gamma: f64,
    pub tau: f64,
    pub offset: f64,
    pub stats: Vec<StatParameters>,
    pub posteriors: BTreeMap<String, HyperPosterior>
}

impl Hyperparameters {
    pub fn from_priors(priors: &HyperPriors, stat_schema: &[String]) -> Hyperparameters {
        let mut posteriors = BTreeMap::new();
        posteriors.insert(HyperParameter::Beta.to_string(), priors.beta.into());
        posteriors.insert(HyperParameter::Gamma.to_string(), priors.gamma.into());
        posteriors.insert(HyperParameter::Tau.to_string(), priors.tau.into());
        posteriors.insert(
            HyperParameter::Offset.to_string(),
            HyperPosterior::Gaussian {
                mean: priors.offset.mean,
                variance: 1.0 / priors.offset.precision
            }
        );

        let weight = HyperPosterior::Gaussian {
            mean: priors.stat_weight.mean,
            variance: 1.0 / priors.stat_weight.precision
        };
        for name in stat_schema {
            posteriors.insert(format!("{}.own_weight", name), weight);
            posteriors.insert(format!("{}.opponent_weight", name), weight);
            posteriors.insert(format!("{}.noise", name), priors.stat_noise.into());
        }

        Hyperparameters {
            beta: priors.beta.mean(),
            gamma: priors.gamma.mean(),
            tau: priors.tau.mean(),
            offset: priors.offset.mean,
            stats: vec![StatParameters::from_priors(priors); stat_schema.len()],
            posteriors
        }
    }

    /// Largest relative change of any point estimate since `previous`. The
    /// offset sits near zero, so its change is taken on the skill scale.
    pub fn change_from(&self, previous: &Hyperparameters) -> f64 {
        let precisions = [
            relative_change(previous.beta, self.beta),
            relative_change(previous.gamma, self.gamma),
            relative_change(previous.tau, self.tau),
            (self.offset - previous.offset).abs()
        ];
        let stats = self.stats.iter().zip(&previous.stats).flat_map(|(now, before)| {
            [
                relative_change(before.own_weight, now.own_weight),
                relative_change(before.opponent_weight, now.opponent_weight),
                relative_change(before.noise, now.noise)
            ]
        });

        precisions.into_iter().chain(stats).fold(0.0, f64::max)
    }

    pub fn performance_variance(&self) -> f64 {
        1.0 / self.beta
    }

    /// Variance of the step into a node reached after `lapse` days.
    /// Lapses within `epsilon` of zero add only dynamics noise.
    pub fn transition_variance(&self, lapse: f64, epsilon: f64) -> f64 {
        self.dynamics_variance() + self.decay_variance(lapse, epsilon)
    }

    pub fn dynamics_variance(&self) -> f64 {
        1.0 / self.gamma
    }

    pub fn decay_variance(&self, lapse: f64, epsilon: f64) -> f64 {
        if lapse > epsilon {
            lapse / self.tau
        } else {
            0.0
        }
    }
}

/// Re-estimates the hyperparameters against the current marginals.
///
/// # How this works
///
/// The messages of the last sweep are held fixed and the estimates are
/// iterated to a fixed point against them:
/// - β solves `β = E[β | residuals(β)]` directly by bisection on `log β`.
///   Repeating the plain Gamma update only creeps towards that point when
///   the outcomes say little about individual performances. The point
///   itself swings against the messages it was solved for, so β only moves
///   `hyperparameter_step` of the way there in log space each sweep.
/// - γ, τ, the offset and the stat regressions repeat their conjugate
///   updates until no estimate moves by more than `ESTIMATOR_TOLERANCE`.
///   The chains were smoothed with the old γ, τ and offset, so those three
///   overshoot the same way and take the same partial step.
pub fn estimate(
    current: &Hyperparameters,
    chains: &[SkillChain],
    factors: &[MatchFactor],
    config: &InferenceConfig
) -> Hyperparameters {
    let priors = &config.priors;
    let evidence: Vec<(Gaussian, Gaussian)> = factors
        .par_iter()
        .flat_map_iter(MatchFactor::performance_evidence)
        .collect();

    let mut next = current.clone();
    let target = performance_precision(&priors.beta, &evidence, current.beta);
    let beta = damped_precision(current.beta, target, config.hyperparameter_step);
    next.beta = beta.mean();
    next.posteriors.insert(HyperParameter::Beta.to_string(), beta.into());

    let mut iterations = 0;
    while iterations < ESTIMATOR_ITERATIONS {
        let step = estimate_step(&next, chains, factors, config);
        let change = step.change_from(&next);
        next = step;
        iterations += 1;

        if change < ESTIMATOR_TOLERANCE {
            break;
        }
    }
    next = damped_transitions(current, next, config.hyperparameter_step);

    debug!(
        beta = next.beta,
        gamma = next.gamma,
        tau = next.tau,
        offset = next.offset,
        iterations,
        "Re-estimated hyperparameters"
    );

    next
}

/// One conjugate update of everything but β.
fn estimate_step(
    current: &Hyperparameters,
    chains: &[SkillChain],
    factors: &[MatchFactor],
    config: &InferenceConfig
) -> Hyperparameters {
    let priors = &config.priors;
    let transitions = chains
        .par_iter()
        .map(|chain| chain.transition_statistics(current, config.lapse_epsilon))
        .reduce(TransitionStatistics::default, TransitionStatistics::merge);

    let mut next = current.clone();

    let gamma = priors.gamma.observe(transitions.dynamics_count, transitions.dynamics_sum_sq);
    next.gamma = gamma.mean();
    next.posteriors.insert(HyperParameter::Gamma.to_string(), gamma.into());

    let tau = priors.tau.observe(transitions.decay_count, transitions.decay_sum_sq);
    next.tau = tau.mean();
    next.posteriors.insert(HyperParameter::Tau.to_string(), tau.into());

    let offset_precision = priors.offset.precision + transitions.offset_precision;
    let offset_mean =
        (priors.offset.precision * priors.offset.mean + transitions.offset_precision_mean) / offset_precision;
    next.offset = offset_mean;
    next.posteriors.insert(
        HyperParameter::Offset.to_string(),
        HyperPosterior::Gaussian {
            mean: offset_mean,
            variance: 1.0 / offset_precision
        }
    );

    for (i, name) in config.stat_schema.iter().enumerate() {
        let params = current.stats[i];
        let statistics = factors
            .par_iter()
            .map(|factor| stat_regression::regression_statistics(factor, i, &params))
            .reduce(RegressionStatistics::default, RegressionStatistics::merge);

        let fit = stat_regression::fit(&statistics, &params, priors);
        next.stats[i] = fit.parameters;
        next.posteriors.insert(format!("{}.own_weight", name), fit.own_weight);
        next.posteriors.insert(format!("{}.opponent_weight", name), fit.opponent_weight);
        next.posteriors.insert(format!("{}.noise", name), fit.noise.into());
    }

    next
}

/// The Gamma posterior of β at the precision that reproduces itself as the
/// posterior mean, given fixed performance messages.
///
/// The gap `E[β | residuals(β)] - β` is positive for small β and negative
/// for large β, so the root is bracketed by stepping out from `start` and
/// then bisected. Falls back to a single update if no bracket is found.
fn performance_precision(prior: &GammaPrior, evidence: &[(Gaussian, Gaussian)], start: f64) -> GammaPrior {
    if evidence.is_empty() {
        return *prior;
    }

    let posterior = |beta: f64| {
        let statistics = PerformanceStatistics::from_evidence(evidence, 1.0 / beta);
        prior.observe(statistics.count, statistics.sum_sq)
    };
    let gap = |beta: f64| posterior(beta).mean() - beta;

    let mut low = start;
    let mut high = start;
    for _ in 0..BRACKET_STEPS {
        if gap(low) > 0.0 {
            break;
        }
        low /= 10.0;
    }
    for _ in 0..BRACKET_STEPS {
        if gap(high) < 0.0 {
            break;
        }
        high *= 10.0;
    }

    if !(gap(low) >= 0.0 && gap(high) <= 0.0) {
        warn!(start, "Could not bracket the performance precision");
        return posterior(start);
    }

    for _ in 0..BISECTION_STEPS {
        let mid = (low * high).sqrt();
        if gap(mid) > 0.0 {
            low = mid;
        } else {
            high = mid;
        }
        if high / low - 1.0 < ESTIMATOR_TOLERANCE {
            break;
        }
    }

    posterior((low * high).sqrt())
}

/// Moves γ and τ (in log space) and the offset `step` of the way from
/// `current` to the fixed points held in `next`.
fn damped_transitions(current: &Hyperparameters, mut next: Hyperparameters, step: f64) -> Hyperparameters {
    if let Some(target) = gamma_posterior(&next, HyperParameter::Gamma) {
        let gamma = damped_precision(current.gamma, target, step);
        next.gamma = gamma.mean();
        next.posteriors.insert(HyperParameter::Gamma.to_string(), gamma.into());
    }

    if let Some(target) = gamma_posterior(&next, HyperParameter::Tau) {
        let tau = damped_precision(current.tau, target, step);
        next.tau = tau.mean();
        next.posteriors.insert(HyperParameter::Tau.to_string(), tau.into());
    }

    let offset = current.offset + step * (next.offset - current.offset);
    let key = HyperParameter::Offset.to_string();
    if let Some(HyperPosterior::Gaussian { variance, .. }) = next.posteriors.get(&key).copied() {
        next.posteriors.insert(key, HyperPosterior::Gaussian { mean: offset, variance });
    }
    next.offset = offset;

    next
}

fn gamma_posterior(hyper: &Hyperparameters, parameter: HyperParameter) -> Option<GammaPrior> {
    match hyper.posteriors.get(&parameter.to_string()) {
        Some(HyperPosterior::Gamma { shape, rate }) => Some(GammaPrior::new(*shape, *rate)),
        _ => None
    }
}

/// The target's shape with its mean moved to `current^(1 - step)·target^step`.
fn damped_precision(current: f64, target: GammaPrior, step: f64) -> GammaPrior {
    let mean = (current.ln() + step * (target.mean().ln() - current.ln())).exp();
    if !mean.is_finite() || mean <= 0.0 {
        return target;
    }

    GammaPrior::new(target.shape, target.shape / mean)
}

fn relative_change(before: f64, after: f64) -> f64 {
    let scale = before.abs().max(after.abs());
    if scale <= MIN_PRECISION {
        0.0
    } else {
        (after - before).abs() / scale
    }
}
