// Binomial family for proportions in [0, 1]: V(μ) = μ (1 − μ).

use ndarray::Array1;

use super::{y_log_y_over_mu, Family};
use crate::float::GlmFloat;

/// Binomial family (Bernoulli outcomes or observed proportions).
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialFamily;

impl<F: GlmFloat> Family<F> for BinomialFamily {
    fn name(&self) -> &str {
        "Binomial"
    }

    fn variance(&self, mu: &Array1<F>) -> Array1<F> {
        mu.mapv(|m| m * (F::one() - m))
    }

    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F> {
        mu.mapv(|m| F::one() - F::lit(2.0) * m)
    }

    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F> {
        let two = F::lit(2.0);
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| {
                two * (y_log_y_over_mu(yi, mi)
                    + y_log_y_over_mu(F::one() - yi, F::one() - mi))
            })
            .collect()
    }

    fn in_support(&self, y: F) -> bool {
        y >= F::zero() && y <= F::one()
    }

    fn support_description(&self) -> &'static str {
        "in [0, 1]"
    }

    fn clamp_mu(&self, mu: &Array1<F>) -> Array1<F> {
        let eps = F::epsilon();
        mu.mapv(|m| m.max(eps).min(F::one() - eps))
    }
}
