// =============================================================================
// Link Functions
// =============================================================================
//
// The link g connects the mean μ to the linear predictor η:
//
//     g(μ) = η = Xβ + intercept + offset
//
// The solvers work on the η side, so each link exposes:
//   - link(μ)               η = g(μ)           (start values)
//   - inverse(η)            μ = g⁻¹(η)         (predictions, deviance)
//   - inverse_derivative(η) dμ/dη              (IRLS working weights)
//   - inverse_second_derivative(η) d²μ/dη²     (observed information)
//
// AVAILABLE LINKS:
//   - Identity: η = μ                  default for Gaussian
//   - Log:      η = log(μ)             default for Poisson, Gamma, Tweedie, ...
//   - Logit:    η = log(μ / (1 - μ))   default for Binomial
//   - Cloglog:  η = log(-log(1 - μ))   asymmetric alternative for Binomial
//
// =============================================================================

use ndarray::Array1;

use crate::error::{GlmPathError, Result};
use crate::float::{max_exp_arg, GlmFloat};

/// A GLM link function.
pub trait Link<F: GlmFloat>: Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// η = g(μ)
    fn link(&self, mu: &Array1<F>) -> Array1<F>;

    /// μ = g⁻¹(η)
    fn inverse(&self, eta: &Array1<F>) -> Array1<F>;

    /// dμ/dη evaluated at η.
    fn inverse_derivative(&self, eta: &Array1<F>) -> Array1<F>;

    /// d²μ/dη² evaluated at η.
    fn inverse_second_derivative(&self, eta: &Array1<F>) -> Array1<F>;

    /// Scalar version of `link`, used for the start intercept.
    fn link_scalar(&self, mu: F) -> F {
        self.link(&Array1::from_elem(1, mu))[0]
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Identity link: η = μ.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLink;

impl<F: GlmFloat> Link<F> for IdentityLink {
    fn name(&self) -> &str {
        "identity"
    }

    fn link(&self, mu: &Array1<F>) -> Array1<F> {
        mu.clone()
    }

    fn inverse(&self, eta: &Array1<F>) -> Array1<F> {
        eta.clone()
    }

    fn inverse_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        Array1::ones(eta.len())
    }

    fn inverse_second_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        Array1::zeros(eta.len())
    }
}

// =============================================================================
// Log
// =============================================================================

/// Log link: η = log(μ), μ = exp(η).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLink;

impl<F: GlmFloat> Link<F> for LogLink {
    fn name(&self) -> &str {
        "log"
    }

    fn link(&self, mu: &Array1<F>) -> Array1<F> {
        mu.mapv(|m| m.max(F::min_positive_value()).ln())
    }

    fn inverse(&self, eta: &Array1<F>) -> Array1<F> {
        // clamp to avoid overflow
        let cap = max_exp_arg::<F>();
        eta.mapv(|e| e.min(cap).exp())
    }

    fn inverse_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        self.inverse(eta)
    }

    fn inverse_second_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        self.inverse(eta)
    }
}

// =============================================================================
// Logit
// =============================================================================

/// Logit link: η = log(μ / (1 − μ)), μ = 1 / (1 + exp(−η)).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogitLink;

impl<F: GlmFloat> Link<F> for LogitLink {
    fn name(&self) -> &str {
        "logit"
    }

    fn link(&self, mu: &Array1<F>) -> Array1<F> {
        let eps = F::epsilon();
        mu.mapv(|m| {
            let m = m.max(eps).min(F::one() - eps);
            (m / (F::one() - m)).ln()
        })
    }

    fn inverse(&self, eta: &Array1<F>) -> Array1<F> {
        let cap = max_exp_arg::<F>();
        eta.mapv(|e| F::one() / (F::one() + (-e).min(cap).exp()))
    }

    fn inverse_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        self.inverse(eta).mapv(|m| m * (F::one() - m))
    }

    fn inverse_second_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        self.inverse(eta)
            .mapv(|m| m * (F::one() - m) * (F::one() - F::lit(2.0) * m))
    }
}

// =============================================================================
// Complementary log-log
// =============================================================================

/// Complementary log-log link: η = log(−log(1 − μ)).
#[derive(Debug, Clone, Copy, Default)]
pub struct CloglogLink;

impl<F: GlmFloat> Link<F> for CloglogLink {
    fn name(&self) -> &str {
        "cloglog"
    }

    fn link(&self, mu: &Array1<F>) -> Array1<F> {
        let eps = F::epsilon();
        mu.mapv(|m| {
            let m = m.max(eps).min(F::one() - eps);
            (-(F::one() - m).ln()).ln()
        })
    }

    fn inverse(&self, eta: &Array1<F>) -> Array1<F> {
        let cap = max_exp_arg::<F>();
        eta.mapv(|e| F::one() - (-(e.min(cap).exp())).exp())
    }

    fn inverse_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        let cap = max_exp_arg::<F>();
        eta.mapv(|e| {
            let e = e.min(cap);
            (e - e.exp()).exp()
        })
    }

    fn inverse_second_derivative(&self, eta: &Array1<F>) -> Array1<F> {
        let cap = max_exp_arg::<F>();
        eta.mapv(|e| {
            let e = e.min(cap);
            (e - e.exp()).exp() * (F::one() - e.exp())
        })
    }
}

// =============================================================================
// Link selection
// =============================================================================

/// Closed set of supported links, resolved once per fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkSpec {
    /// Use the family's default link.
    #[default]
    Auto,
    Identity,
    Log,
    Logit,
    Cloglog,
}

impl LinkSpec {
    /// Parse a link name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "auto" => Ok(LinkSpec::Auto),
            "identity" => Ok(LinkSpec::Identity),
            "log" => Ok(LinkSpec::Log),
            "logit" => Ok(LinkSpec::Logit),
            "cloglog" => Ok(LinkSpec::Cloglog),
            other => Err(GlmPathError::InvalidValue(format!(
                "Unknown link '{}'. Use 'auto', 'identity', 'log', 'logit' or 'cloglog'.",
                other
            ))),
        }
    }

    /// Replace `Auto` with the given default.
    pub fn resolve(self, default: LinkSpec) -> LinkSpec {
        match self {
            LinkSpec::Auto => default,
            other => other,
        }
    }

    /// Instantiate the link. `Auto` must be resolved first.
    pub fn build<F: GlmFloat>(self) -> Result<Box<dyn Link<F>>> {
        match self {
            LinkSpec::Identity => Ok(Box::new(IdentityLink)),
            LinkSpec::Log => Ok(Box::new(LogLink)),
            LinkSpec::Logit => Ok(Box::new(LogitLink)),
            LinkSpec::Cloglog => Ok(Box::new(CloglogLink)),
            LinkSpec::Auto => Err(GlmPathError::InvalidValue(
                "link 'auto' must be resolved against a family before use".to_string(),
            )),
        }
    }
}
