// Model constants
pub const TEAM_SIZE: usize = 5;
pub const DEFAULT_MEAN: f64 = 1500.0;
pub const DEFAULT_SIGMA: f64 = 250.0;
pub const DEFAULT_VARIANCE: f64 = DEFAULT_SIGMA * DEFAULT_SIGMA;

// Hyperparameter priors, as (shape, rate) pairs over precisions.
// The prior means correspond to a performance deviation of DEFAULT_SIGMA / 2,
// a per-match dynamics deviation of DEFAULT_SIGMA / 25 and a daily decay
// deviation of roughly DEFAULT_SIGMA / 50.
pub const BETA_SHAPE: f64 = 10.0;
pub const BETA_RATE: f64 = BETA_SHAPE * (DEFAULT_SIGMA / 2.0) * (DEFAULT_SIGMA / 2.0);
pub const GAMMA_SHAPE: f64 = 10.0;
pub const GAMMA_RATE: f64 = GAMMA_SHAPE * (DEFAULT_SIGMA / 25.0) * (DEFAULT_SIGMA / 25.0);
pub const TAU_SHAPE: f64 = 10.0;
pub const TAU_RATE: f64 = TAU_SHAPE * (DEFAULT_SIGMA / 50.0) * (DEFAULT_SIGMA / 50.0);
pub const OFFSET_MEAN: f64 = 0.0;
pub const OFFSET_PRECISION: f64 = 1.0;

// Stat regression priors
pub const STAT_WEIGHT_MEAN: f64 = 0.0;
pub const STAT_WEIGHT_PRECISION: f64 = 1.0e-4;
pub const STAT_NOISE_SHAPE: f64 = 2.0;
pub const STAT_NOISE_RATE: f64 = 2.0;

// Inference
pub const DAMPING: f64 = 0.7;
pub const MAX_SWEEPS: usize = 50;
pub const TOLERANCE: f64 = 1.0e-3;
pub const LAPSE_EPSILON: f64 = 1.0e-6;
pub const MIN_PRECISION: f64 = 1.0e-12;
/// Largest relative hyperparameter change between sweeps that still counts as converged
pub const HYPERPARAMETER_TOLERANCE: f64 = 1.0e-3;

// Hyperparameter estimation within a sweep
/// Share of the way to its fixed point each estimated hyperparameter moves per sweep
pub const HYPERPARAMETER_STEP: f64 = 0.2;
pub const ESTIMATOR_ITERATIONS: usize = 25;
pub const ESTIMATOR_TOLERANCE: f64 = 1.0e-6;
pub const BRACKET_STEPS: usize = 30;
pub const BISECTION_STEPS: usize = 100;

// Decay
pub const DECAY_GRACE_DAYS: f64 = 30.0;
pub const DECAY_VARIANCE_PER_DAY: f64 = 0.15 * DEFAULT_SIGMA;
pub const SECONDS_PER_DAY: f64 = 86_400.0;
