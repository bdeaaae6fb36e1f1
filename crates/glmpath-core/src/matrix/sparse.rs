// =============================================================================
// Sparse Design Matrices
// =============================================================================
//
// `CscMatrix` wraps an sprs matrix and keeps it in both compressed layouts:
//
//   - CSC (columns) for Xᵀv and column moments
//   - CSR (rows) for X·v, row slicing and the sandwich product
//
// Memory is twice the non-zeros, which is still tiny compared to densifying.
//
// =============================================================================

use ndarray::{Array1, Array2};
use sprs::{CsMat, TriMat};

use super::{variance_from_moments, DesignMatrix};
use crate::error::{GlmPathError, Result};
use crate::float::GlmFloat;

/// Sparse design matrix stored column- and row-compressed.
#[derive(Debug, Clone)]
pub struct CscMatrix<F: GlmFloat> {
    csc: CsMat<F>,
    csr: CsMat<F>,
}

impl<F: GlmFloat> CscMatrix<F> {
    /// Wrap an sprs matrix (either layout).
    pub fn new(mat: CsMat<F>) -> Self {
        if mat.is_csc() {
            let csr = mat.to_csr();
            Self { csc: mat, csr }
        } else {
            let csc = mat.to_csc();
            Self { csc, csr: mat }
        }
    }

    /// Build from (row, col, value) triplets. Duplicate entries are summed.
    pub fn from_triplets(
        shape: (usize, usize),
        rows: &[usize],
        cols: &[usize],
        values: &[F],
    ) -> Result<Self> {
        if rows.len() != cols.len() || rows.len() != values.len() {
            return Err(GlmPathError::DimensionMismatch(format!(
                "triplets have {} rows, {} cols and {} values",
                rows.len(),
                cols.len(),
                values.len()
            )));
        }
        let mut tri = TriMat::new(shape);
        for ((&r, &c), &v) in rows.iter().zip(cols.iter()).zip(values.iter()) {
            if r >= shape.0 || c >= shape.1 {
                return Err(GlmPathError::DimensionMismatch(format!(
                    "triplet ({}, {}) outside a {}x{} matrix",
                    r, c, shape.0, shape.1
                )));
            }
            tri.add_triplet(r, c, v);
        }
        let csc: CsMat<F> = tri.to_csc();
        Ok(Self::new(csc))
    }

    /// Build from a dense matrix, keeping only the non-zero entries.
    pub fn from_dense(x: &Array2<F>) -> Self {
        let mut tri = TriMat::new((x.nrows(), x.ncols()));
        for ((i, j), &v) in x.indexed_iter() {
            if v != F::zero() {
                tri.add_triplet(i, j, v);
            }
        }
        let csc: CsMat<F> = tri.to_csc();
        Self::new(csc)
    }

    /// Number of stored non-zeros.
    pub fn nnz(&self) -> usize {
        self.csc.nnz()
    }
}

impl<F: GlmFloat> DesignMatrix<F> for CscMatrix<F> {
    fn nrows(&self) -> usize {
        self.csc.rows()
    }

    fn ncols(&self) -> usize {
        self.csc.cols()
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for &r in rows {
            if let Some(row) = self.csr.outer_view(r) {
                for (j, &v) in row.iter() {
                    indices.push(j);
                    data.push(v);
                }
            }
            indptr.push(indices.len());
        }
        let csr = CsMat::new((rows.len(), self.ncols()), indptr, indices, data);
        Self::new(csr)
    }

    fn matvec(&self, v: &Array1<F>) -> Array1<F> {
        let mut out = Array1::zeros(self.nrows());
        for (i, row) in self.csr.outer_iterator().enumerate() {
            out[i] = row.iter().map(|(j, &x)| x * v[j]).sum();
        }
        out
    }

    fn transpose_matvec(&self, v: &Array1<F>) -> Array1<F> {
        let mut out = Array1::zeros(self.ncols());
        for (j, col) in self.csc.outer_iterator().enumerate() {
            out[j] = col.iter().map(|(i, &x)| x * v[i]).sum();
        }
        out
    }

    fn sandwich(&self, d: &Array1<F>) -> Array2<F> {
        let p = self.ncols();
        let mut out = Array2::zeros((p, p));
        for (i, row) in self.csr.outer_iterator().enumerate() {
            let di = d[i];
            if di == F::zero() {
                continue;
            }
            for (j, &xj) in row.iter() {
                let dxj = di * xj;
                for (k, &xk) in row.iter() {
                    if k >= j {
                        out[[j, k]] += dxj * xk;
                    }
                }
            }
        }
        // mirror the upper triangle
        for j in 0..p {
            for k in (j + 1)..p {
                out[[k, j]] = out[[j, k]];
            }
        }
        out
    }

    fn weighted_col_moments(&self, weights: &Array1<F>) -> (Array1<F>, Array1<F>) {
        let p = self.ncols();
        let mut means = Array1::zeros(p);
        let mut vars = Array1::zeros(p);
        for (j, col) in self.csc.outer_iterator().enumerate() {
            let mut m = F::zero();
            let mut m2 = F::zero();
            for (i, &x) in col.iter() {
                m += weights[i] * x;
                m2 += weights[i] * x * x;
            }
            means[j] = m;
            vars[j] = variance_from_moments(m, m2);
        }
        (means, vars)
    }

    fn all_finite(&self) -> bool {
        self.csc.data().iter().all(|v| v.is_finite())
    }
}
