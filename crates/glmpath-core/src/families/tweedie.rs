// =============================================================================
// Tweedie Family
// =============================================================================
//
// V(μ) = μ^p. Special cases: p = 0 Gaussian, p = 1 Poisson, p = 2 Gamma,
// p = 3 inverse Gaussian. Powers strictly between 0 and 1 do not correspond
// to a distribution and are rejected by `FamilySpec::validate`.
//
// For 1 < p < 2 (compound Poisson-gamma) zeros are allowed, which is why
// this family is popular for insurance pure premiums.
//
// =============================================================================

use ndarray::Array1;

use super::{clamp_positive, y_log_y_over_mu, Family};
use crate::float::GlmFloat;

/// Tweedie family with variance power `p`.
#[derive(Debug, Clone, Copy)]
pub struct TweedieFamily {
    power: f64,
}

impl TweedieFamily {
    pub fn new(power: f64) -> Self {
        Self { power }
    }

    pub fn power(&self) -> f64 {
        self.power
    }
}

impl<F: GlmFloat> Family<F> for TweedieFamily {
    fn name(&self) -> &str {
        "Tweedie"
    }

    fn variance(&self, mu: &Array1<F>) -> Array1<F> {
        let p = F::lit(self.power);
        mu.mapv(|m| m.powf(p))
    }

    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F> {
        let p = F::lit(self.power);
        if self.power == 0.0 {
            return Array1::zeros(mu.len());
        }
        mu.mapv(|m| p * m.powf(p - F::one()))
    }

    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F> {
        let p = self.power;
        let two = F::lit(2.0);
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| {
                if p == 0.0 {
                    (yi - mi) * (yi - mi)
                } else if p == 1.0 {
                    two * (y_log_y_over_mu(yi, mi) - (yi - mi))
                } else if p == 2.0 {
                    two * ((yi - mi) / mi - (yi / mi).ln())
                } else {
                    let one_m_p = F::lit(1.0 - p);
                    let two_m_p = F::lit(2.0 - p);
                    let y_pos = yi.max(F::zero());
                    two * (y_pos.powf(two_m_p) / (one_m_p * two_m_p)
                        - yi * mi.powf(one_m_p) / one_m_p
                        + mi.powf(two_m_p) / two_m_p)
                }
            })
            .collect()
    }

    fn in_support(&self, y: F) -> bool {
        if !y.is_finite() {
            return false;
        }
        if self.power <= 0.0 {
            true
        } else if self.power < 2.0 {
            y >= F::zero()
        } else {
            y > F::zero()
        }
    }

    fn support_description(&self) -> &'static str {
        if self.power <= 0.0 {
            "finite"
        } else if self.power < 2.0 {
            "non-negative"
        } else {
            "strictly positive"
        }
    }

    fn clamp_mu(&self, mu: &Array1<F>) -> Array1<F> {
        if self.power > 0.0 {
            clamp_positive(mu)
        } else {
            mu.clone()
        }
    }
}
