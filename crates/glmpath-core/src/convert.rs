// =============================================================================
// ndarray ↔ nalgebra Conversion Utilities
// =============================================================================
//
// ndarray is the storage format used everywhere in the crate (it is what the
// Python bindings hand us). nalgebra does the dense factorizations: Cholesky
// for the normal equations of the least-squares inner solver, inverses for
// the covariance matrix and symmetric eigenvalues for the P2 definiteness
// check.
//
// These helpers are generic over the nalgebra scalar so the same code serves
// both f32 and f64 fits. They are called from the `GlmFloat` impls, which
// pin the concrete type.
//
// =============================================================================

use nalgebra::{DMatrix, DVector, RealField, Scalar, SymmetricEigen};
use ndarray::{Array1, Array2};

// =============================================================================
// ndarray → nalgebra
// =============================================================================

/// Convert an ndarray Array2 to a nalgebra DMatrix.
///
/// Works for any memory layout (element-wise copy).
#[inline]
pub fn to_dmatrix<T: Scalar + Copy>(a: &Array2<T>) -> DMatrix<T> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Convert an ndarray Array1 to a nalgebra DVector.
#[inline]
pub fn to_dvector<T: Scalar + Copy>(v: &Array1<T>) -> DVector<T> {
    DVector::from_iterator(v.len(), v.iter().copied())
}

// =============================================================================
// nalgebra → ndarray
// =============================================================================

/// Convert a nalgebra DMatrix to an ndarray Array2.
#[inline]
pub fn to_array2<T: Scalar + Copy>(m: &DMatrix<T>) -> Array2<T> {
    Array2::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

/// Convert a nalgebra DVector to an ndarray Array1.
#[inline]
pub fn to_array1<T: Scalar + Copy>(v: &DVector<T>) -> Array1<T> {
    v.iter().copied().collect()
}

// =============================================================================
// Common linear algebra operations (ndarray in, ndarray out)
// =============================================================================

/// Solve a symmetric positive-definite system Ax = b.
///
/// Tries Cholesky first, falls back to LU decomposition.
/// Returns None if the matrix is singular.
pub fn solve_symmetric<T: RealField + Copy>(a: &Array2<T>, b: &Array1<T>) -> Option<Array1<T>> {
    let a_nalg = to_dmatrix(a);
    let b_nalg = to_dvector(b);

    if let Some(chol) = a_nalg.clone().cholesky() {
        Some(to_array1(&chol.solve(&b_nalg)))
    } else {
        a_nalg.lu().solve(&b_nalg).map(|x| to_array1(&x))
    }
}

/// Invert a symmetric matrix, using Cholesky if possible.
///
/// Returns None if the matrix is singular.
pub fn invert_symmetric<T: RealField + Copy>(a: &Array2<T>) -> Option<Array2<T>> {
    let a_nalg = to_dmatrix(a);
    if let Some(chol) = a_nalg.clone().cholesky() {
        return Some(to_array2(&chol.inverse()));
    }
    a_nalg.try_inverse().map(|inv| to_array2(&inv))
}

/// Smallest eigenvalue of a symmetric matrix.
///
/// Only the lower triangle is read, so the caller is responsible for
/// checking symmetry first. Returns None for an empty matrix.
pub fn min_symmetric_eigenvalue<T: RealField + Copy>(a: &Array2<T>) -> Option<T> {
    if a.is_empty() {
        return None;
    }
    let eig = SymmetricEigen::new(to_dmatrix(a));
    eig.eigenvalues
        .iter()
        .copied()
        .fold(None, |acc: Option<T>, v| match acc {
            Some(m) if m <= v => Some(m),
            _ => Some(v),
        })
}

// =============================================================================
// Tests
// =============================================================================
