use serde::{Deserialize, Serialize};

use crate::model::gaussian::Gaussian;

/// Current knowledge of a player's latent skill.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SkillBelief {
    pub mean: f64,
    pub variance: f64
}

impl SkillBelief {
    pub fn new(mean: f64, variance: f64) -> SkillBelief {
        SkillBelief { mean, variance }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.variance.is_finite() && self.variance > 0.0
    }
}

impl From<SkillBelief> for Gaussian {
    fn from(belief: SkillBelief) -> Gaussian {
        Gaussian::from_moments(belief.mean, belief.variance)
    }
}

impl From<Gaussian> for SkillBelief {
    fn from(gaussian: Gaussian) -> SkillBelief {
        SkillBelief {
            mean: gaussian.mean(),
            variance: gaussian.variance()
        }
    }
}
