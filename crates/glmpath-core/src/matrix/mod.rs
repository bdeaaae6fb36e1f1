// =============================================================================
// Design Matrix Abstraction
// =============================================================================
//
// The solvers never index into X directly. They only need:
//
//   - row slicing by an index set (to build fold training/test sets)
//   - X·v and Xᵀ·v
//   - the weighted Gram matrix Xᵀ diag(d) X ("sandwich" product)
//   - weighted column means and variances (for standardization)
//   - a finiteness check over the stored entries
//
// Anything providing these can be fitted. Two storage formats ship with the
// crate:
//
//   - dense:  `ndarray::Array2<F>`
//   - sparse: `CscMatrix<F>` (compressed sparse columns, backed by sprs)
//
// Neither the Standardizer nor the solvers densify a sparse matrix: centering
// and scaling are carried as separate shift / multiplier vectors (see
// `standardize.rs`).
//
// =============================================================================

mod dense;
mod sparse;

pub use sparse::CscMatrix;

use ndarray::{Array1, Array2};

use crate::float::GlmFloat;

/// Read-only numeric design matrix (n_samples × n_features).
pub trait DesignMatrix<F: GlmFloat>: Clone + Send + Sync {
    /// Number of samples.
    fn nrows(&self) -> usize;

    /// Number of features.
    fn ncols(&self) -> usize;

    /// New matrix holding the given rows, in the given order.
    fn select_rows(&self, rows: &[usize]) -> Self;

    /// X · v (length n_samples).
    fn matvec(&self, v: &Array1<F>) -> Array1<F>;

    /// Xᵀ · v (length n_features).
    fn transpose_matvec(&self, v: &Array1<F>) -> Array1<F>;

    /// Xᵀ · diag(d) · X (n_features × n_features).
    ///
    /// Rows with `d[i] == 0` contribute nothing and are skipped.
    fn sandwich(&self, d: &Array1<F>) -> Array2<F>;

    /// Weighted column means and (population) variances.
    ///
    /// `weights` are expected to sum to one.
    fn weighted_col_moments(&self, weights: &Array1<F>) -> (Array1<F>, Array1<F>);

    /// True when no stored entry is NaN or infinite.
    fn all_finite(&self) -> bool;
}

/// Weighted variance from the first two weighted moments, clamped at zero
/// to absorb round-off.
#[inline]
pub(crate) fn variance_from_moments<F: GlmFloat>(mean: F, mean_sq: F) -> F {
    (mean_sq - mean * mean).max(F::zero())
}
