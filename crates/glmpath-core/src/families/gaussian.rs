// Gaussian (normal) family: V(μ) = 1, d(y, μ) = (y − μ)².

use ndarray::Array1;

use super::Family;
use crate::float::GlmFloat;

/// Gaussian family. With the identity link this is ordinary least squares.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianFamily;

impl<F: GlmFloat> Family<F> for GaussianFamily {
    fn name(&self) -> &str {
        "Gaussian"
    }

    fn variance(&self, mu: &Array1<F>) -> Array1<F> {
        Array1::ones(mu.len())
    }

    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F> {
        Array1::zeros(mu.len())
    }

    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F> {
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| (yi - mi) * (yi - mi))
            .collect()
    }

    fn in_support(&self, y: F) -> bool {
        y.is_finite()
    }

    fn support_description(&self) -> &'static str {
        "finite"
    }
}
