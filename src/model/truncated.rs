//! Moment matching for a Gaussian truncated by an inequality.
//!
//! For `d ~ N(μ, σ²)` conditioned on `d > 0`, with `t = μ/σ`:
//!
//! - `μ' = μ + σ·v(t)`
//! - `σ'² = σ²·(1 − w(t))`
//!
//! where `v(t) = φ(t)/Φ(t)` and `w(t) = v(t)·(v(t) + t)`.
//!
//! Far in the lower tail both `φ(t)` and `Φ(t)` underflow and `v(t) + t`
//! cancels catastrophically, so below [`TAIL_THRESHOLD`] the ratio is
//! evaluated from the continued fraction of the Mills ratio instead.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use statrs::function::erf::erfc;

use crate::model::constants::MIN_PRECISION;

/// Below this `t` the continued fraction is used.
pub const TAIL_THRESHOLD: f64 = -8.0;
const FRACTION_DEPTH: usize = 120;

/// Standard normal density.
pub fn pdf(t: f64) -> f64 {
    (-0.5 * t * t).exp() / (2.0 * PI).sqrt()
}

/// Standard normal distribution function, accurate in relative terms in the lower tail.
pub fn cdf(t: f64) -> f64 {
    0.5 * erfc(-t * FRAC_1_SQRT_2)
}

/// Returns `(v(t), 1 − w(t))`.
///
/// `1 − w(t)` is returned instead of `w(t)` because the corrected variance
/// needs it and, deep in the tail, it is much smaller than `w(t)` itself.
pub fn hazard(t: f64) -> (f64, f64) {
    if t < TAIL_THRESHOLD {
        return tail_hazard(-t);
    }

    let v = pdf(t) / cdf(t);
    let w = v * (v + t);

    (v, (1.0 - w).clamp(MIN_PRECISION, 1.0))
}

pub fn v(t: f64) -> f64 {
    hazard(t).0
}

pub fn w(t: f64) -> f64 {
    1.0 - hazard(t).1
}

/// Evaluates the Mills ratio `Φ(−x)/φ(x) = 1/(x + 1/(x + 2/(x + 3/(x + ...))))`
/// from the innermost term outwards, keeping the two outermost partial
/// denominators so that `v + t` and `1 − w` come out without subtraction
/// of nearly equal numbers.
fn tail_hazard(x: f64) -> (f64, f64) {
    let mut a2 = x;
    for k in (3..=FRACTION_DEPTH).rev() {
        a2 = x + k as f64 / a2;
    }
    let a1 = x + 2.0 / a2;

    // v = a0 = x + 1/a1, so v + t = v - x = 1/a1
    let v = x + 1.0 / a1;
    // 1 - w = 1 - v/a1 = (a1 - x - 1/a1)/a1 = (2/a2 - 1/a1)/a1
    let one_minus_w = (2.0 / a2 - 1.0 / a1) / a1;

    (v, one_minus_w.clamp(MIN_PRECISION, 1.0))
}

/// Moments of `N(mean, variance)` conditioned on being positive.
pub fn truncate_positive(mean: f64, variance: f64) -> (f64, f64) {
    let sigma = variance.sqrt();
    let (v, one_minus_w) = hazard(mean / sigma);

    (mean + sigma * v, variance * one_minus_w)
}

/// Moments of `N(mean, variance)` conditioned on being non-positive.
pub fn truncate_non_positive(mean: f64, variance: f64) -> (f64, f64) {
    let (flipped_mean, truncated_variance) = truncate_positive(-mean, variance);

    (-flipped_mean, truncated_variance)
}
