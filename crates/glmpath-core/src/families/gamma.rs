// Gamma (V = μ²) and inverse Gaussian (V = μ³) families for positive data.

use ndarray::Array1;

use super::{clamp_positive, Family};
use crate::float::GlmFloat;

/// Gamma family: d(y, μ) = 2 [(y − μ)/μ − log(y/μ)].
#[derive(Debug, Clone, Copy, Default)]
pub struct GammaFamily;

impl<F: GlmFloat> Family<F> for GammaFamily {
    fn name(&self) -> &str {
        "Gamma"
    }

    fn variance(&self, mu: &Array1<F>) -> Array1<F> {
        mu.mapv(|m| m * m)
    }

    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F> {
        mu.mapv(|m| F::lit(2.0) * m)
    }

    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F> {
        let two = F::lit(2.0);
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| two * ((yi - mi) / mi - (yi / mi).ln()))
            .collect()
    }

    fn in_support(&self, y: F) -> bool {
        y.is_finite() && y > F::zero()
    }

    fn support_description(&self) -> &'static str {
        "strictly positive"
    }

    fn clamp_mu(&self, mu: &Array1<F>) -> Array1<F> {
        clamp_positive(mu)
    }
}

/// Inverse Gaussian family: d(y, μ) = (y − μ)² / (y μ²).
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseGaussianFamily;

impl<F: GlmFloat> Family<F> for InverseGaussianFamily {
    fn name(&self) -> &str {
        "InverseGaussian"
    }

    fn variance(&self, mu: &Array1<F>) -> Array1<F> {
        mu.mapv(|m| m * m * m)
    }

    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F> {
        mu.mapv(|m| F::lit(3.0) * m * m)
    }

    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F> {
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| (yi - mi) * (yi - mi) / (yi * mi * mi))
            .collect()
    }

    fn in_support(&self, y: F) -> bool {
        y.is_finite() && y > F::zero()
    }

    fn support_description(&self) -> &'static str {
        "strictly positive"
    }

    fn clamp_mu(&self, mu: &Array1<F>) -> Array1<F> {
        clamp_positive(mu)
    }
}
