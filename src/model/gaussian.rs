use std::ops::{Div, Mul};

use serde::{Deserialize, Serialize};

use crate::model::constants::MIN_PRECISION;

/// A Gaussian message in natural parameters.
///
/// `precision` is 1/σ² and `precision_mean` is μ/σ². A precision of zero
/// is the uniform message, which is the identity for products and quotients.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Gaussian {
    pub precision: f64,
    pub precision_mean: f64
}

impl Gaussian {
    pub fn new(precision: f64, precision_mean: f64) -> Gaussian {
        Gaussian {
            precision,
            precision_mean
        }
    }

    pub fn uniform() -> Gaussian {
        Gaussian::default()
    }

    /// A zero, negative or non-finite variance has no natural parameters
    /// and gives the uniform message.
    pub fn from_moments(mean: f64, variance: f64) -> Gaussian {
        if !(variance > 0.0 && variance.is_finite() && mean.is_finite()) {
            return Gaussian::uniform();
        }

        let precision = 1.0 / variance;
        if !precision.is_finite() {
            return Gaussian::uniform();
        }

        Gaussian {
            precision,
            precision_mean: precision * mean
        }
    }

    pub fn is_proper(&self) -> bool {
        self.precision > MIN_PRECISION && self.precision.is_finite() && self.precision_mean.is_finite()
    }

    pub fn mean(&self) -> f64 {
        if self.is_proper() {
            self.precision_mean / self.precision
        } else {
            0.0
        }
    }

    pub fn variance(&self) -> f64 {
        if self.is_proper() {
            1.0 / self.precision
        } else {
            f64::INFINITY
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Adds independent Gaussian noise with the given mean and variance,
    /// i.e. the message through `y = x + offset + N(0, variance)`.
    /// The uniform message passes through unchanged.
    pub fn shifted(self, offset: f64, variance: f64) -> Gaussian {
        if !self.is_proper() {
            return Gaussian::uniform();
        }

        Gaussian::from_moments(self.mean() + offset, self.variance() + variance)
    }

    /// Blends `self` (the proposed message) with `previous` in natural parameters.
    /// An `alpha` of 1.0 keeps the proposal unchanged.
    pub fn damped(self, previous: Gaussian, alpha: f64) -> Gaussian {
        Gaussian {
            precision: alpha * self.precision + (1.0 - alpha) * previous.precision,
            precision_mean: alpha * self.precision_mean + (1.0 - alpha) * previous.precision_mean
        }
    }

    /// Clamps a message whose precision went slightly negative through
    /// floating point drift back to the uniform message.
    pub fn clamped(self) -> Gaussian {
        if self.precision < 0.0 {
            Gaussian::uniform()
        } else {
            self
        }
    }

    /// The change between two beliefs, measured in mean and standard deviation.
    pub fn distance(&self, other: &Gaussian) -> f64 {
        if !self.is_proper() || !other.is_proper() {
            return if self.is_proper() == other.is_proper() { 0.0 } else { f64::INFINITY };
        }

        (self.mean() - other.mean()).abs() + (self.std_dev() - other.std_dev()).abs()
    }
}

impl Mul for Gaussian {
    type Output = Gaussian;

    fn mul(self, rhs: Gaussian) -> Gaussian {
        Gaussian {
            precision: self.precision + rhs.precision,
            precision_mean: self.precision_mean + rhs.precision_mean
        }
    }
}

impl Div for Gaussian {
    type Output = Gaussian;

    fn div(self, rhs: Gaussian) -> Gaussian {
        Gaussian {
            precision: self.precision - rhs.precision,
            precision_mean: self.precision_mean - rhs.precision_mean
        }
    }
}
