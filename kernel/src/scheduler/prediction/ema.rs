//! EMA (Exponential Moving Average) burst prediction

use crate::config::DEFAULT_BURST_SMOOTHING;

/// Estimator for the next CPU burst of a thread
///
/// `next = a * observed + (1 - a) * prior`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstEstimator {
    alpha: f64,
}

impl BurstEstimator {
    /// `alpha` must lie in (0, 1]; the config layer validates it
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fold an observed burst into the prior estimate
    pub fn next(&self, observed: f64, prior: f64) -> f64 {
        self.alpha * observed + (1.0 - self.alpha) * prior
    }
}

impl Default for BurstEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_BURST_SMOOTHING)
    }
}
