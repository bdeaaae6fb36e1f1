// =============================================================================
// Coefficient Constraints
// =============================================================================
//
// Two kinds of constraints on the feature coefficients w (never the
// intercept):
//
//   - box bounds:            lower ≤ w ≤ upper   (per feature, ±∞ allowed)
//   - linear inequalities:   A · w ≤ b
//
// Either one forces the coordinate-descent inner solver, which handles
// bounds by clipping each coordinate update and inequalities through an
// augmented-Lagrangian loop.
//
// =============================================================================

use ndarray::{Array1, Array2};

use crate::error::{GlmPathError, Result};
use crate::float::GlmFloat;

/// Linear inequality system A · w ≤ b.
#[derive(Debug, Clone)]
pub struct LinearInequalities<F: GlmFloat> {
    pub a: Array2<F>,
    pub b: Array1<F>,
}

impl<F: GlmFloat> LinearInequalities<F> {
    /// True when the system has no rows.
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// A · w − b (positive entries are violations).
    pub fn residual(&self, w: &Array1<F>) -> Array1<F> {
        self.a.dot(w) - &self.b
    }

    /// Largest violation max(0, max(A·w − b)).
    pub fn max_violation(&self, w: &Array1<F>) -> F {
        self.residual(w)
            .iter()
            .fold(F::zero(), |acc, &r| acc.max(r))
    }

    /// Absolute violation tolerance for a relative tolerance, scaled by max(1, |b|).
    pub fn tolerance(&self, rel_tol: F) -> F {
        rel_tol * self.b.iter().fold(F::one(), |acc, &v| acc.max(v.abs()))
    }

    /// Whether w satisfies A·w ≤ b up to the relative tolerance.
    pub fn is_satisfied(&self, w: &Array1<F>, rel_tol: F) -> bool {
        self.max_violation(w) <= self.tolerance(rel_tol)
    }
}

/// Bounds and inequalities for one fit.
#[derive(Debug, Clone)]
pub struct Constraints<F: GlmFloat> {
    pub lower: Array1<F>,
    pub upper: Array1<F>,
    pub inequalities: Option<LinearInequalities<F>>,
}

impl<F: GlmFloat> Constraints<F> {
    /// No constraints at all.
    pub fn unconstrained(n_features: usize) -> Self {
        Self {
            lower: Array1::from_elem(n_features, F::neg_infinity()),
            upper: Array1::from_elem(n_features, F::infinity()),
            inequalities: None,
        }
    }

    /// Validate user inputs and assemble the constraint set.
    ///
    /// Errors:
    /// - shape mismatches
    /// - only one of `a_ineq` / `b_ineq` given
    /// - `lower > upper` anywhere, or a zero row of A with negative b
    ///   (`ConstraintInfeasible`)
    pub fn new(
        n_features: usize,
        lower: Option<&Array1<F>>,
        upper: Option<&Array1<F>>,
        a_ineq: Option<&Array2<F>>,
        b_ineq: Option<&Array1<F>>,
    ) -> Result<Self> {
        let lower = check_bounds(lower, n_features, F::neg_infinity(), "lower_bounds")?;
        let upper = check_bounds(upper, n_features, F::infinity(), "upper_bounds")?;

        if let Some(j) = (0..n_features).find(|&j| lower[j] > upper[j]) {
            return Err(GlmPathError::ConstraintInfeasible(format!(
                "lower bound {} exceeds upper bound {} for feature {}",
                lower[j], upper[j], j
            )));
        }

        let inequalities = match (a_ineq, b_ineq) {
            (None, None) => None,
            (Some(a), Some(b)) => {
                if a.ncols() != n_features {
                    return Err(GlmPathError::DimensionMismatch(format!(
                        "A_ineq has {} columns but X has {} features",
                        a.ncols(),
                        n_features
                    )));
                }
                if a.nrows() != b.len() {
                    return Err(GlmPathError::DimensionMismatch(format!(
                        "A_ineq has {} rows but b_ineq has {} elements",
                        a.nrows(),
                        b.len()
                    )));
                }
                for (k, row) in a.rows().into_iter().enumerate() {
                    if row.iter().all(|&v| v == F::zero()) && b[k] < F::zero() {
                        return Err(GlmPathError::ConstraintInfeasible(format!(
                            "inequality {} reads 0 <= {}",
                            k, b[k]
                        )));
                    }
                }
                Some(LinearInequalities {
                    a: a.clone(),
                    b: b.clone(),
                })
            }
            _ => {
                return Err(GlmPathError::InvalidValue(
                    "A_ineq and b_ineq must be given together".to_string(),
                ))
            }
        };

        Ok(Self {
            lower,
            upper,
            inequalities,
        })
    }

    /// True when any finite bound or any inequality is present.
    pub fn is_active(&self) -> bool {
        self.has_bounds() || self.inequalities.is_some()
    }

    /// True when any bound is finite.
    pub fn has_bounds(&self) -> bool {
        self.lower.iter().any(|v| v.is_finite()) || self.upper.iter().any(|v| v.is_finite())
    }

    /// Clip w into the box.
    pub fn project_bounds(&self, w: &mut Array1<F>) {
        for (j, v) in w.iter_mut().enumerate() {
            *v = v.max(self.lower[j]).min(self.upper[j]);
        }
    }
}

/// Expand an optional bound vector to full length.
fn check_bounds<F: GlmFloat>(
    bounds: Option<&Array1<F>>,
    n_features: usize,
    fill: F,
    name: &str,
) -> Result<Array1<F>> {
    match bounds {
        None => Ok(Array1::from_elem(n_features, fill)),
        Some(b) if b.len() == n_features => {
            if b.iter().any(|v| v.is_nan()) {
                return Err(GlmPathError::InvalidValue(format!("{} contains NaN", name)));
            }
            Ok(b.clone())
        }
        Some(b) => Err(GlmPathError::DimensionMismatch(format!(
            "{} has {} elements but X has {} features",
            name,
            b.len(),
            n_features
        ))),
    }
}
