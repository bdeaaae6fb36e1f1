// =============================================================================
// Distribution Families
// =============================================================================
//
// A family describes the distribution of Y given the mean μ:
//
//   - variance(μ):          Var(Y) = φ · V(μ)
//   - unit_deviance(y, μ):  per-observation contribution to the deviance
//   - in_support(y):        whether y is a possible outcome
//
// The penalized solver only ever needs the deviance and, for one IRLS step,
// the working weights / working response pair (see `working_set` below).
//
// FAMILY SELECTION:
// -----------------
// The set of families is closed. `FamilySpec` names one of them (parsed from
// strings such as "poisson" or "tweedie (1.5)") and is resolved ONCE per fit
// into a `Box<dyn Family<F>>`. Nothing downstream inspects types or attributes.
//
// =============================================================================

mod binomial;
mod gamma;
mod gaussian;
mod negative_binomial;
mod poisson;
mod tweedie;

pub use binomial::BinomialFamily;
pub use gamma::{GammaFamily, InverseGaussianFamily};
pub use gaussian::GaussianFamily;
pub use negative_binomial::NegativeBinomialFamily;
pub use poisson::PoissonFamily;
pub use tweedie::TweedieFamily;

use ndarray::Array1;

use crate::error::{GlmPathError, Result};
use crate::float::GlmFloat;
use crate::links::{Link, LinkSpec};

/// A GLM distribution family.
pub trait Family<F: GlmFloat>: Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// Variance function V(μ).
    fn variance(&self, mu: &Array1<F>) -> Array1<F>;

    /// dV/dμ, needed for the observed information.
    fn variance_derivative(&self, mu: &Array1<F>) -> Array1<F>;

    /// Per-observation deviance contributions.
    fn unit_deviance(&self, y: &Array1<F>, mu: &Array1<F>) -> Array1<F>;

    /// Whether a single response value is inside the support.
    fn in_support(&self, y: F) -> bool;

    /// Text describing the support, for error messages.
    fn support_description(&self) -> &'static str;

    /// Pull μ back into the family's valid range.
    fn clamp_mu(&self, mu: &Array1<F>) -> Array1<F> {
        mu.clone()
    }

    /// Weighted deviance Σ wᵢ · d(yᵢ, μᵢ).
    ///
    /// Without weights every observation counts once.
    fn deviance(&self, y: &Array1<F>, mu: &Array1<F>, weights: Option<&Array1<F>>) -> F {
        let unit = self.unit_deviance(y, &self.clamp_mu(mu));
        match weights {
            Some(w) => unit.iter().zip(w.iter()).map(|(&d, &wi)| wi * d).sum(),
            None => unit.sum(),
        }
    }

    /// Domain error if any y lies outside the support.
    fn check_support(&self, y: &Array1<F>) -> Result<()> {
        if let Some((i, &bad)) = y.iter().enumerate().find(|&(_, &v)| !self.in_support(v)) {
            return Err(GlmPathError::Domain {
                family: self.name().to_string(),
                detail: format!(
                    "y[{}] = {} but the response must be {}",
                    i,
                    bad,
                    self.support_description()
                ),
            });
        }
        Ok(())
    }
}

// =============================================================================
// IRLS working quantities
// =============================================================================

/// Everything one IRLS reweighting step needs, evaluated at the current η.
#[derive(Debug, Clone)]
pub struct WorkingSet<F: GlmFloat> {
    /// μ = g⁻¹(η), clamped to the family's range.
    pub mu: Array1<F>,
    /// Wᵢ = wᵢ · (dμ/dη)² / V(μᵢ)
    pub working_weights: Array1<F>,
    /// zᵢ = ηᵢ + (yᵢ − μᵢ) / (dμ/dη)
    pub working_response: Array1<F>,
}

impl<F: GlmFloat> WorkingSet<F> {
    /// Gradient of ½·deviance with respect to each ηᵢ: −Wᵢ (zᵢ − ηᵢ).
    pub fn eta_gradient(&self, eta: &Array1<F>) -> Array1<F> {
        self.working_weights
            .iter()
            .zip(self.working_response.iter())
            .zip(eta.iter())
            .map(|((&w, &z), &e)| -w * (z - e))
            .collect()
    }
}

/// Compute μ, working weights and working response at η.
pub fn working_set<F: GlmFloat>(
    family: &dyn Family<F>,
    link: &dyn Link<F>,
    y: &Array1<F>,
    eta: &Array1<F>,
    weights: &Array1<F>,
) -> WorkingSet<F> {
    let mu = family.clamp_mu(&link.inverse(eta));
    let variance = family.variance(&mu);
    let tiny = F::min_positive_value().sqrt();
    let dmu = link.inverse_derivative(eta).mapv(|d| {
        if d.abs() < tiny {
            if d < F::zero() {
                -tiny
            } else {
                tiny
            }
        } else {
            d
        }
    });

    let n = y.len();
    let mut working_weights = Array1::zeros(n);
    let mut working_response = Array1::zeros(n);
    for i in 0..n {
        let v = variance[i].max(tiny);
        working_weights[i] = weights[i] * dmu[i] * dmu[i] / v;
        working_response[i] = eta[i] + (y[i] - mu[i]) / dmu[i];
    }

    WorkingSet {
        mu,
        working_weights,
        working_response,
    }
}

// =============================================================================
// Family selection
// =============================================================================

/// Closed set of supported families.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FamilySpec {
    #[default]
    Gaussian,
    Poisson,
    Binomial,
    Gamma,
    InverseGaussian,
    Tweedie { power: f64 },
    NegativeBinomial { theta: f64 },
}

impl FamilySpec {
    /// Parse a family name.
    ///
    /// Accepts "gaussian"/"normal", "poisson", "binomial", "gamma",
    /// "inverse.gaussian", "tweedie", "tweedie (p)", "negative.binomial" and
    /// "negative.binomial (theta)". Tweedie defaults to power 1.5 and the
    /// negative binomial to theta 1.0.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        let (base, param) = match lower.find('(') {
            Some(start) => {
                let end = lower.rfind(')').filter(|&e| e > start).unwrap_or(lower.len());
                let inner = lower[start + 1..end].trim();
                let value = inner.parse::<f64>().map_err(|_| {
                    GlmPathError::InvalidValue(format!(
                        "Failed to parse parameter '{}' in family '{}'",
                        inner, name
                    ))
                })?;
                (lower[..start].trim().to_string(), Some(value))
            }
            None => (lower.clone(), None),
        };

        let spec = match base.as_str() {
            "gaussian" | "normal" => FamilySpec::Gaussian,
            "poisson" => FamilySpec::Poisson,
            "binomial" => FamilySpec::Binomial,
            "gamma" => FamilySpec::Gamma,
            "inverse.gaussian" | "inverse_gaussian" => FamilySpec::InverseGaussian,
            "tweedie" => FamilySpec::Tweedie {
                power: param.unwrap_or(1.5),
            },
            "negative.binomial" | "negative_binomial" | "negativebinomial" => {
                FamilySpec::NegativeBinomial {
                    theta: param.unwrap_or(1.0),
                }
            }
            _ => {
                return Err(GlmPathError::InvalidValue(format!(
                    "Unknown family '{}'. Use 'gaussian', 'poisson', 'binomial', 'gamma', \
                     'inverse.gaussian', 'tweedie' or 'negative.binomial'.",
                    name
                )))
            }
        };
        if param.is_some()
            && !matches!(
                spec,
                FamilySpec::Tweedie { .. } | FamilySpec::NegativeBinomial { .. }
            )
        {
            return Err(GlmPathError::InvalidValue(format!(
                "family '{}' does not take a parameter",
                name
            )));
        }
        spec.validate()?;
        Ok(spec)
    }

    /// Check the family parameters.
    pub fn validate(&self) -> Result<()> {
        match *self {
            FamilySpec::Tweedie { power } if power > 0.0 && power < 1.0 => {
                Err(GlmPathError::InvalidValue(format!(
                    "Tweedie power must be <= 0 or >= 1, got {}",
                    power
                )))
            }
            FamilySpec::NegativeBinomial { theta } if !(theta > 0.0) => {
                Err(GlmPathError::InvalidValue(format!(
                    "theta must be > 0 for the negative binomial family, got {}",
                    theta
                )))
            }
            _ => Ok(()),
        }
    }

    /// Link used when the caller asks for `LinkSpec::Auto`.
    pub fn default_link(&self) -> LinkSpec {
        match *self {
            FamilySpec::Gaussian => LinkSpec::Identity,
            FamilySpec::Binomial => LinkSpec::Logit,
            FamilySpec::Tweedie { power } if power == 0.0 => LinkSpec::Identity,
            _ => LinkSpec::Log,
        }
    }

    /// Instantiate the family.
    pub fn build<F: GlmFloat>(&self) -> Result<Box<dyn Family<F>>> {
        self.validate()?;
        Ok(match *self {
            FamilySpec::Gaussian => Box::new(GaussianFamily),
            FamilySpec::Poisson => Box::new(PoissonFamily),
            FamilySpec::Binomial => Box::new(BinomialFamily),
            FamilySpec::Gamma => Box::new(GammaFamily),
            FamilySpec::InverseGaussian => Box::new(InverseGaussianFamily),
            FamilySpec::Tweedie { power } => Box::new(TweedieFamily::new(power)),
            FamilySpec::NegativeBinomial { theta } => Box::new(NegativeBinomialFamily::new(theta)),
        })
    }
}

/// y · log(y / μ), with the convention 0 · log(0) = 0.
#[inline]
pub(crate) fn y_log_y_over_mu<F: GlmFloat>(y: F, mu: F) -> F {
    if y > F::zero() {
        y * (y / mu).ln()
    } else {
        F::zero()
    }
}

/// Clamp μ to be strictly positive.
#[inline]
pub(crate) fn clamp_positive<F: GlmFloat>(mu: &Array1<F>) -> Array1<F> {
    let floor = F::min_positive_value().sqrt();
    mu.mapv(|m| m.max(floor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{IdentityLink, LogLink};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_parse_family_names() {
        assert_eq!(FamilySpec::from_name("normal").unwrap(), FamilySpec::Gaussian);
        assert_eq!(
            FamilySpec::from_name("tweedie (1.2)").unwrap(),
            FamilySpec::Tweedie { power: 1.2 }
        );
        assert_eq!(
            FamilySpec::from_name("negative.binomial").unwrap(),
            FamilySpec::NegativeBinomial { theta: 1.0 }
        );
        assert!(FamilySpec::from_name("tweedie (0.5)").is_err());
        assert!(FamilySpec::from_name("poisson (2)").is_err());
        assert!(FamilySpec::from_name("weibull").is_err());
    }

    #[test]
    fn test_default_links() {
        assert_eq!(FamilySpec::Gaussian.default_link(), LinkSpec::Identity);
        assert_eq!(FamilySpec::Binomial.default_link(), LinkSpec::Logit);
        assert_eq!(FamilySpec::Poisson.default_link(), LinkSpec::Log);
    }

    #[test]
    fn test_deviance_is_zero_at_perfect_fit() {
        let y = array![0.5, 1.0, 3.0];
        for spec in [
            FamilySpec::Gaussian,
            FamilySpec::Poisson,
            FamilySpec::Gamma,
            FamilySpec::InverseGaussian,
            FamilySpec::Tweedie { power: 1.5 },
            FamilySpec::NegativeBinomial { theta: 2.0 },
        ] {
            let fam = spec.build::<f64>().unwrap();
            assert_abs_diff_eq!(fam.deviance(&y, &y, None), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_variance_derivative_matches_finite_difference() {
        let mu = array![0.2, 0.6];
        let h = 1e-6;
        for spec in [
            FamilySpec::Gaussian,
            FamilySpec::Poisson,
            FamilySpec::Binomial,
            FamilySpec::Gamma,
            FamilySpec::InverseGaussian,
            FamilySpec::Tweedie { power: 1.5 },
            FamilySpec::NegativeBinomial { theta: 2.0 },
        ] {
            let fam = spec.build::<f64>().unwrap();
            let dv = fam.variance_derivative(&mu);
            let up = fam.variance(&mu.mapv(|m| m + h));
            let down = fam.variance(&mu.mapv(|m| m - h));
            for i in 0..2 {
                assert_abs_diff_eq!(dv[i], (up[i] - down[i]) / (2.0 * h), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_check_support_reports_domain_error() {
        let fam = PoissonFamily;
        let err = Family::<f64>::check_support(&fam, &array![1.0, -2.0]).unwrap_err();
        assert!(matches!(err, GlmPathError::Domain { .. }));
    }

    #[test]
    fn test_gaussian_working_set_is_identity_regression() {
        let y = array![1.0, 2.0];
        let eta = array![0.5, 2.5];
        let w = array![0.25, 0.75];
        let ws = working_set(&GaussianFamily, &IdentityLink, &y, &eta, &w);
        assert_abs_diff_eq!(ws.working_weights[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(ws.working_response[1], 2.0, epsilon = 1e-12);
        // gradient of ½ Σ w (y - η)²
        let g = ws.eta_gradient(&eta);
        assert_abs_diff_eq!(g[0], -0.25 * 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(g[1], 0.75 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_poisson_working_weights() {
        let y = array![2.0];
        let eta = array![0.0];
        let w = array![1.0];
        let ws = working_set(&PoissonFamily, &LogLink, &y, &eta, &w);
        // μ = 1, dμ/dη = 1, V = 1
        assert_abs_diff_eq!(ws.working_weights[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ws.working_response[0], 1.0, epsilon = 1e-12);
    }
}
