// =============================================================================
// Regularization: Elastic-Net Penalties with Feature Weights
// =============================================================================
//
// The penalized objective minimized at one path point is
//
//     ½ · deviance(β)  +  Σⱼ P1ⱼ |βⱼ|  +  ½ βᵀ P2 β
//
// where, for a path point (alpha, l1_ratio),
//
//     P1 = alpha ·  l1_ratio      · P1_base     (L1, sparsity)
//     P2 = alpha · (1 − l1_ratio) · P2_base     (L2, shrinkage / Tikhonov)
//
// P1_base is a non-negative vector (one weight per feature; zero means "do
// not penalize this coefficient"). P2_base is either a diagonal (vector) or
// a full positive-semidefinite matrix. The intercept is never penalized.
//
// SPECIAL CASES:
//   - l1_ratio = 1  → lasso
//   - l1_ratio = 0  → ridge
//   - alpha    = 0  → unpenalized GLM
//
// =============================================================================

use ndarray::{Array1, Array2};

use crate::error::{GlmPathError, Result};
use crate::float::GlmFloat;

// =============================================================================
// User-facing penalty specifications
// =============================================================================

/// Per-feature L1 weights.
#[derive(Debug, Clone, Default)]
pub enum P1Spec<F: GlmFloat> {
    /// Every feature gets weight one.
    #[default]
    Identity,
    /// Explicit non-negative weights, one per feature.
    Weights(Array1<F>),
}

/// The L2 penalty matrix.
#[derive(Debug, Clone, Default)]
pub enum P2Spec<F: GlmFloat> {
    /// Identity matrix (plain squared L2 norm).
    #[default]
    Identity,
    /// Diagonal matrix given by its diagonal.
    Diagonal(Array1<F>),
    /// Full symmetric positive-semidefinite matrix.
    Matrix(Array2<F>),
}

/// Resolve the P1 specification into a weight vector.
pub fn resolve_p1<F: GlmFloat>(spec: &P1Spec<F>, n_features: usize) -> Result<Array1<F>> {
    match spec {
        P1Spec::Identity => Ok(Array1::ones(n_features)),
        P1Spec::Weights(w) => {
            if w.len() != n_features {
                return Err(GlmPathError::DimensionMismatch(format!(
                    "P1 has {} elements but X has {} features",
                    w.len(),
                    n_features
                )));
            }
            if w.iter().any(|&v| !(v >= F::zero()) || !v.is_finite()) {
                return Err(GlmPathError::InvalidValue(
                    "P1 must contain finite, non-negative values".to_string(),
                ));
            }
            Ok(w.clone())
        }
    }
}

/// Resolve the P2 specification into an `L2Penalty`.
pub fn resolve_p2<F: GlmFloat>(spec: &P2Spec<F>, n_features: usize) -> Result<L2Penalty<F>> {
    match spec {
        P2Spec::Identity => Ok(L2Penalty::Diagonal(Array1::ones(n_features))),
        P2Spec::Diagonal(d) => {
            if d.len() != n_features {
                return Err(GlmPathError::DimensionMismatch(format!(
                    "P2 has {} elements but X has {} features",
                    d.len(),
                    n_features
                )));
            }
            Ok(L2Penalty::Diagonal(d.clone()))
        }
        P2Spec::Matrix(m) => {
            if m.nrows() != n_features || m.ncols() != n_features {
                return Err(GlmPathError::DimensionMismatch(format!(
                    "P2 is {}x{} but X has {} features",
                    m.nrows(),
                    m.ncols(),
                    n_features
                )));
            }
            Ok(L2Penalty::Full(m.clone()))
        }
    }
}

// =============================================================================
// L2 penalty matrix
// =============================================================================

/// The quadratic part of the penalty, stored compactly when diagonal.
#[derive(Debug, Clone)]
pub enum L2Penalty<F: GlmFloat> {
    Diagonal(Array1<F>),
    Full(Array2<F>),
}

impl<F: GlmFloat> L2Penalty<F> {
    /// c · P2
    pub fn scaled(&self, c: F) -> Self {
        match self {
            L2Penalty::Diagonal(d) => L2Penalty::Diagonal(d * c),
            L2Penalty::Full(m) => L2Penalty::Full(m * c),
        }
    }

    /// D · P2 · D for diagonal D = diag(mult).
    pub fn congruence(&self, mult: &Array1<F>) -> Self {
        match self {
            L2Penalty::Diagonal(d) => L2Penalty::Diagonal(d * &mult.mapv(|m| m * m)),
            L2Penalty::Full(m) => {
                let mut out = m.clone();
                for ((i, j), v) in out.indexed_iter_mut() {
                    *v = *v * mult[i] * mult[j];
                }
                L2Penalty::Full(out)
            }
        }
    }

    /// P2 · β
    pub fn matvec(&self, beta: &Array1<F>) -> Array1<F> {
        match self {
            L2Penalty::Diagonal(d) => d * beta,
            L2Penalty::Full(m) => m.dot(beta),
        }
    }

    /// βᵀ · P2 · β
    pub fn quadratic_form(&self, beta: &Array1<F>) -> F {
        self.matvec(beta).dot(beta)
    }

    /// Add P2 into `hessian[offset.., offset..]`.
    pub fn add_to(&self, hessian: &mut Array2<F>, offset: usize) {
        match self {
            L2Penalty::Diagonal(d) => {
                for (j, &v) in d.iter().enumerate() {
                    hessian[[offset + j, offset + j]] += v;
                }
            }
            L2Penalty::Full(m) => {
                for ((i, j), &v) in m.indexed_iter() {
                    hessian[[offset + i, offset + j]] += v;
                }
            }
        }
    }

    /// Positive semidefiniteness test with a small relative tolerance.
    ///
    /// A full matrix must also be symmetric.
    pub fn is_positive_semidefinite(&self) -> bool {
        match self {
            L2Penalty::Diagonal(d) => d.iter().all(|&v| v >= F::zero()),
            L2Penalty::Full(m) => {
                let scale = m
                    .iter()
                    .fold(F::one(), |acc, &v| acc.max(v.abs()));
                let tol = F::lit(1e3) * F::epsilon() * scale;
                let n = m.nrows();
                for i in 0..n {
                    for j in (i + 1)..n {
                        if (m[[i, j]] - m[[j, i]]).abs() > tol {
                            return false;
                        }
                    }
                }
                match F::min_eigenvalue(m) {
                    Some(min) => min >= -tol,
                    None => true,
                }
            }
        }
    }

    /// Configuration error unless P2 is positive semidefinite.
    pub fn validate(&self) -> Result<()> {
        if self.is_positive_semidefinite() {
            return Ok(());
        }
        let msg = match self {
            L2Penalty::Diagonal(_) => "1d array P2 must not have negative values.",
            L2Penalty::Full(_) => "P2 must be positive semi-definite.",
        };
        Err(GlmPathError::InvalidValue(msg.to_string()))
    }
}

// =============================================================================
// Regularization configuration
// =============================================================================

/// Penalty strength and L1/L2 mix for one path point.
#[derive(Debug, Clone, Copy)]
pub struct RegularizationConfig<F: GlmFloat> {
    /// Overall penalty strength (alpha ≥ 0).
    pub alpha: F,
    /// Mixing between L1 (1.0) and L2 (0.0).
    pub l1_ratio: F,
}

impl<F: GlmFloat> RegularizationConfig<F> {
    /// Pure L1.
    pub fn lasso(alpha: F) -> Self {
        Self {
            alpha,
            l1_ratio: F::one(),
        }
    }

    /// Pure L2.
    pub fn ridge(alpha: F) -> Self {
        Self {
            alpha,
            l1_ratio: F::zero(),
        }
    }

    /// Mix of both.
    pub fn elastic_net(alpha: F, l1_ratio: F) -> Self {
        Self { alpha, l1_ratio }
    }

    /// Scale base penalties to this (alpha, l1_ratio).
    pub fn apply(&self, p1_base: &Array1<F>, p2_base: &L2Penalty<F>) -> Penalty<F> {
        let l1 = self.alpha * self.l1_ratio;
        let l2 = self.alpha * (F::one() - self.l1_ratio);
        Penalty {
            p1: p1_base * l1,
            p2: p2_base.scaled(l2),
        }
    }
}

/// Fully scaled penalty for one solve.
#[derive(Debug, Clone)]
pub struct Penalty<F: GlmFloat> {
    /// L1 weights (already multiplied by alpha · l1_ratio).
    pub p1: Array1<F>,
    /// L2 matrix (already multiplied by alpha · (1 − l1_ratio)).
    pub p2: L2Penalty<F>,
}

impl<F: GlmFloat> Penalty<F> {
    /// Σ P1ⱼ|βⱼ| + ½ βᵀP2β for the feature coefficients.
    pub fn value(&self, beta: &Array1<F>) -> F {
        let l1: F = self
            .p1
            .iter()
            .zip(beta.iter())
            .map(|(&p, &b)| p * b.abs())
            .sum();
        l1 + F::lit(0.5) * self.p2.quadratic_form(beta)
    }
}
