use crate::model::{constants::MIN_PRECISION, gaussian::Gaussian};

/// Joint Gaussian over the performances of one match.
///
/// Starts from independent per-slot priors and absorbs sites, each a Gaussian
/// factor on a linear projection `aᵀp`, through rank-one updates.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPosterior {
    n: usize,
    mean: Vec<f64>,
    covariance: Vec<f64>
}

impl LocalPosterior {
    pub fn new(prior: &[Gaussian]) -> LocalPosterior {
        let n = prior.len();
        let mut covariance = vec![0.0; n * n];
        for (i, p) in prior.iter().enumerate() {
            covariance[i * n + i] = p.variance();
        }

        LocalPosterior {
            n,
            mean: prior.iter().map(Gaussian::mean).collect(),
            covariance
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn mean(&self, i: usize) -> f64 {
        self.mean[i]
    }

    pub fn covariance(&self, i: usize, j: usize) -> f64 {
        self.covariance[i * self.n + j]
    }

    pub fn marginal(&self, i: usize) -> Gaussian {
        Gaussian::from_moments(self.mean[i], self.covariance(i, i))
    }

    /// Returns `(aᵀμ, aᵀΣa, Σa)`.
    fn project(&self, a: &[f64]) -> (f64, f64, Vec<f64>) {
        let n = self.n;
        let s: Vec<f64> = (0..n)
            .map(|i| (0..n).map(|j| self.covariance[i * n + j] * a[j]).sum())
            .collect();
        let h = a.iter().zip(&self.mean).map(|(x, m)| x * m).sum();
        let c = a.iter().zip(&s).map(|(x, y)| x * y).sum();

        (h, c, s)
    }

    /// Mean and variance of the projection `aᵀp`. A zero projection has
    /// variance zero, which no Gaussian message can carry.
    pub fn projected(&self, a: &[f64]) -> (f64, f64) {
        let (h, c, _) = self.project(a);
        (h, c.max(0.0))
    }

    /// Multiplies the posterior by a Gaussian factor on `aᵀp`.
    /// Returns false, leaving the posterior untouched, if the update would
    /// make the covariance indefinite.
    pub fn absorb(&mut self, a: &[f64], delta: Gaussian) -> bool {
        if delta.precision == 0.0 && delta.precision_mean == 0.0 {
            return true;
        }

        let (h, c, s) = self.project(a);
        self.apply(&s, h, c, delta)
    }

    fn apply(&mut self, s: &[f64], h: f64, c: f64, delta: Gaussian) -> bool {
        let k = 1.0 + delta.precision * c;
        if k <= MIN_PRECISION {
            return false;
        }

        let n = self.n;
        let mean_step = (delta.precision_mean - delta.precision * h) / k;
        let cov_step = delta.precision / k;
        for i in 0..n {
            self.mean[i] += s[i] * mean_step;
            for j in 0..n {
                self.covariance[i * n + j] -= cov_step * s[i] * s[j];
            }
        }

        true
    }

    /// One expectation propagation step for the site on `aᵀp`.
    ///
    /// Removes `site` from the projected marginal to get the cavity, replaces
    /// the cavity by the moments `tilt` returns for it, and derives the new
    /// site from the result. The new site is blended with the old one by
    /// `damping` and the posterior is updated in place. Returns the site now
    /// included in the posterior.
    pub fn refine_site<F>(&mut self, a: &[f64], site: Gaussian, damping: f64, tilt: F) -> Gaussian
    where
        F: Fn(f64, f64) -> (f64, f64)
    {
        let (h, c, s) = self.project(a);
        if c <= MIN_PRECISION {
            return site;
        }

        let cavity = Gaussian::from_moments(h, c) / site;
        if !cavity.is_proper() {
            return site;
        }

        let (mean, variance) = tilt(cavity.mean(), cavity.variance());
        if !(variance > 0.0) || !mean.is_finite() {
            return site;
        }

        let proposed = (Gaussian::from_moments(mean, variance) / cavity).clamped();
        let updated = proposed.damped(site, damping);

        if self.apply(&s, h, c, updated / site) {
            updated
        } else {
            site
        }
    }
}
