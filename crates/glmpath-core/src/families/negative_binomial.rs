// Negative binomial family with fixed θ: V(μ) = μ + μ²/θ.

use ndarray::Array1;

use super::{clamp_positive, y_log_y_over_mu, Family};
use crate::float::GlmFloat;

/// Negative binomial (NB2) family for over-dispersed counts.
#[derive(Debug, Clone, Copy)]
pub struct NegativeBinomialFamily {
    theta: f64,
}

impl NegativeBinomialFamily {
    pub fn new(theta: f64) -> Self {
        Self { theta }
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }
}

impl<F: GlmFloat> Family<F> for NegativeBinomialFamily {
    fn name(&self) -> &str {
        "NegativeBinomial"
    }

    fn variance(&self, mu: &Array1<F>) -> Array1<F> {
        let theta = F::lit(self.theta);
        mu.mapv(|m| m + m * m / theta)
    }

    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F> {
        let theta = F::lit(self.theta);
        mu.mapv(|m| F::one() + F::lit(2.0) * m / theta)
    }

    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F> {
        let theta = F::lit(self.theta);
        let two = F::lit(2.0);
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| {
                two * (y_log_y_over_mu(yi, mi) - (yi + theta) * ((yi + theta) / (mi + theta)).ln())
            })
            .collect()
    }

    fn in_support(&self, y: F) -> bool {
        y.is_finite() && y >= F::zero()
    }

    fn support_description(&self) -> &'static str {
        "non-negative"
    }

    fn clamp_mu(&self, mu: &Array1<F>) -> Array1<F> {
        clamp_positive(mu)
    }
}
