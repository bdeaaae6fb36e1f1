// Poisson family: V(μ) = μ, d(y, μ) = 2 [y log(y/μ) − (y − μ)].

use ndarray::Array1;

use super::{clamp_positive, y_log_y_over_mu, Family};
use crate::float::GlmFloat;

/// Poisson family for counts (and non-negative rates).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonFamily;

impl<F: GlmFloat> Family<F> for PoissonFamily {
    fn name(&self) -> &str {
        "Poisson"
    }

    fn variance(&self, mu: &Array1<F>) -> Array1<F> {
        mu.clone()
    }

    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F> {
        Array1::ones(mu.len())
    }

    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F> {
        let two = F::lit(2.0);
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| two * (y_log_y_over_mu(yi, mi) - (yi - mi)))
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
