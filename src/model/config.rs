use std::{env, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::model::{
    constants::{
        DAMPING, DECAY_GRACE_DAYS, DECAY_VARIANCE_PER_DAY, DEFAULT_MEAN, DEFAULT_VARIANCE, HYPERPARAMETER_STEP,
        HYPERPARAMETER_TOLERANCE, LAPSE_EPSILON, MAX_SWEEPS, TEAM_SIZE, TOLERANCE
    },
    error::ProcessingError,
    hyperparameters::HyperPriors,
    structures::{chain_direction::ChainDirection, malformed_match_policy::MalformedMatchPolicy}
};

/// Inactivity decay applied by the online updater
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecayConfig {
    /// Days of inactivity before variance starts growing
    pub grace_days: f64,
    /// Variance added per inactive day past the grace period
    pub variance_per_day: f64,
    /// Optional ceiling on decayed variance
    pub max_variance: Option<f64>
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            grace_days: DECAY_GRACE_DAYS,
            variance_per_day: DECAY_VARIANCE_PER_DAY,
            max_variance: None
        }
    }
}

/// Configuration for batch assembly, inference and updating
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    /// Players per roster. Matches with any other roster size are malformed.
    pub team_size: usize,
    pub direction: ChainDirection,
    /// Weight of the newly computed site in each update, in (0, 1]
    pub damping: f64,
    pub max_sweeps: usize,
    /// Sweeps stop once the mean per-node change drops below this
    pub tolerance: f64,
    /// Share of the way to its per-sweep fixed point that β, γ, τ and the offset move, in (0, 1]
    pub hyperparameter_step: f64,
    /// When estimating, sweeps also wait for every hyperparameter to settle within this relative change
    pub hyperparameter_tolerance: f64,
    /// Wall-clock budget per batch, checked between sweeps
    pub time_budget_ms: Option<u64>,
    pub estimate_hyperparameters: bool,
    /// Carry hyperparameter estimates into the next batch instead of resetting to the priors
    pub warm_start: bool,
    /// Prior for players missing from the prior table
    pub default_mean: f64,
    pub default_variance: f64,
    /// Lapses shorter than this (in days) add no decay variance
    pub lapse_epsilon: f64,
    /// Names of the per-player statistics. Empty disables the stat regression factor.
    pub stat_schema: Vec<String>,
    pub malformed_match_policy: MalformedMatchPolicy,
    /// Batch window in days. `None` processes all matches as one batch.
    pub batch_days: Option<i64>,
    /// Keep per-position skill histories in the output
    pub record_history: bool,
    pub decay: DecayConfig,
    pub priors: HyperPriors
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            team_size: TEAM_SIZE,
            direction: ChainDirection::Forward,
            damping: DAMPING,
            max_sweeps: MAX_SWEEPS,
            tolerance: TOLERANCE,
            hyperparameter_step: HYPERPARAMETER_STEP,
            hyperparameter_tolerance: HYPERPARAMETER_TOLERANCE,
            time_budget_ms: None,
            estimate_hyperparameters: true,
            warm_start: true,
            default_mean: DEFAULT_MEAN,
            default_variance: DEFAULT_VARIANCE,
            lapse_epsilon: LAPSE_EPSILON,
            stat_schema: Vec::new(),
            malformed_match_policy: MalformedMatchPolicy::Skip,
            batch_days: None,
            record_history: false,
            decay: DecayConfig::default(),
            priors: HyperPriors::default()
        }
    }
}

impl InferenceConfig {
    /// Creates a configuration from `SKILL_*` environment variables,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ProcessingError> {
        let defaults = Self::default();
        let stat_schema = match env::var("SKILL_STAT_SCHEMA") {
            Ok(schema) => schema
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.stat_schema.clone()
        };

        let config = Self {
            direction: env_or("SKILL_CHAIN_DIRECTION", defaults.direction)?,
            damping: env_or("SKILL_DAMPING", defaults.damping)?,
            max_sweeps: env_or("SKILL_MAX_SWEEPS", defaults.max_sweeps)?,
            tolerance: env_or("SKILL_TOLERANCE", defaults.tolerance)?,
            hyperparameter_step: env_or("SKILL_HYPERPARAMETER_STEP", defaults.hyperparameter_step)?,
            hyperparameter_tolerance: env_or("SKILL_HYPERPARAMETER_TOLERANCE", defaults.hyperparameter_tolerance)?,
            time_budget_ms: env_opt("SKILL_TIME_BUDGET_MS")?,
            estimate_hyperparameters: env_or("SKILL_ESTIMATE_HYPERPARAMETERS", defaults.estimate_hyperparameters)?,
            warm_start: env_or("SKILL_WARM_START", defaults.warm_start)?,
            default_mean: env_or("SKILL_DEFAULT_MEAN", defaults.default_mean)?,
            default_variance: env_or("SKILL_DEFAULT_VARIANCE", defaults.default_variance)?,
            stat_schema,
            malformed_match_policy: env_or("SKILL_MALFORMED_MATCH_POLICY", defaults.malformed_match_policy)?,
            batch_days: env_opt("SKILL_BATCH_DAYS")?,
            decay: DecayConfig {
                grace_days: env_or("SKILL_DECAY_GRACE_DAYS", defaults.decay.grace_days)?,
                variance_per_day: env_or("SKILL_DECAY_VARIANCE_PER_DAY", defaults.decay.variance_per_day)?,
                max_variance: env_opt("SKILL_DECAY_MAX_VARIANCE")?
            },
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProcessingError> {
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(ProcessingError::InvalidConfig(format!(
                "damping must be in (0, 1], found {}",
                self.damping
            )));
        }

        if !(self.hyperparameter_step > 0.0 && self.hyperparameter_step <= 1.0) {
            return Err(ProcessingError::InvalidConfig(format!(
                "hyperparameter step must be in (0, 1], found {}",
                self.hyperparameter_step
            )));
        }

        if self.team_size == 0 {
            return Err(ProcessingError::InvalidConfig("team size must be positive".to_string()));
        }

        if !(self.default_variance > 0.0) {
            return Err(ProcessingError::InvalidConfig(format!(
                "default variance must be positive, found {}",
                self.default_variance
            )));
        }

        if self.tolerance < 0.0 || self.hyperparameter_tolerance < 0.0 || self.lapse_epsilon < 0.0 {
            return Err(ProcessingError::InvalidConfig(
                "tolerances and lapse epsilon must be non-negative".to_string()
            ));
        }

        if self.decay.grace_days < 0.0 || self.decay.variance_per_day < 0.0 {
            return Err(ProcessingError::InvalidConfig(
                "decay grace period and growth must be non-negative".to_string()
            ));
        }

        if matches!(self.batch_days, Some(days) if days <= 0) {
            return Err(ProcessingError::InvalidConfig("batch window must be positive".to_string()));
        }

        self.priors.validate()
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    pub fn stats_enabled(&self) -> bool {
        !self.stat_schema.is_empty()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ProcessingError> {
    match env_opt(key)? {
        Some(value) => Ok(value),
        None => Ok(default)
    }
}

fn env_opt<T: FromStr>(key: &str) -> Result<Option<T>, ProcessingError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ProcessingError::InvalidConfig(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None)
    }
}
