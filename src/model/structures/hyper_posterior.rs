use serde::{Deserialize, Serialize};

/// Posterior over a single hyperparameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "distribution", rename_all = "lowercase")]
pub enum HyperPosterior {
    Gamma { shape: f64, rate: f64 },
    Gaussian { mean: f64, variance: f64 }
}

impl HyperPosterior {
    /// The value used as the point estimate.
    pub fn point_estimate(&self) -> f64 {
        match self {
            HyperPosterior::Gamma { shape, rate } => shape / rate,
            HyperPosterior::Gaussian { mean, .. } => *mean
        }
    }
}
