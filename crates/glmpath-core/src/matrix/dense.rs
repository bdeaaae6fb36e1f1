// Dense design matrices: plain ndarray storage.

use ndarray::{Array1, Array2, Axis};

use super::{variance_from_moments, DesignMatrix};
use crate::float::GlmFloat;

impl<F: GlmFloat> DesignMatrix<F> for Array2<F> {
    fn nrows(&self) -> usize {
        self.len_of(Axis(0))
    }

    fn ncols(&self) -> usize {
        self.len_of(Axis(1))
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        self.select(Axis(0), rows)
    }

    fn matvec(&self, v: &Array1<F>) -> Array1<F> {
        self.dot(v)
    }

    fn transpose_matvec(&self, v: &Array1<F>) -> Array1<F> {
        self.t().dot(v)
    }

    fn sandwich(&self, d: &Array1<F>) -> Array2<F> {
        let active: Vec<usize> = d
            .iter()
            .enumerate()
            .filter(|&(_, &di)| di != F::zero())
            .map(|(i, _)| i)
            .collect();
        if active.is_empty() {
            return Array2::zeros((self.ncols(), self.ncols()));
        }

        // X_a' (D_a X_a) over the active rows only
        let x_active = self.select(Axis(0), &active);
        let d_active: Array1<F> = active.iter().map(|&i| d[i]).collect();
        let dx = &x_active * &d_active.insert_axis(Axis(1));
        x_active.t().dot(&dx)
    }

    fn weighted_col_moments(&self, weights: &Array1<F>) -> (Array1<F>, Array1<F>) {
        let means = self.t().dot(weights);
        let sq = self.mapv(|v| v * v);
        let mean_sq = sq.t().dot(weights);
        let vars = means
            .iter()
            .zip(mean_sq.iter())
            .map(|(&m, &m2)| variance_from_moments(m, m2))
            .collect();
        (means, vars)
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_sandwich_matches_explicit_product() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let d = array![1.0, 0.0, 2.0];
        let s = x.sandwich(&d);
        // rows 0 and 2 only
        let expected = array![[1.0 + 50.0, 2.0 + 60.0], [2.0 + 60.0, 4.0 + 72.0]];
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(s[[i, j]], expected[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_weighted_moments() {
        let x = array![[1.0, 0.0], [3.0, 0.0]];
        let w = array![0.5, 0.5];
        let (means, vars) = x.weighted_col_moments(&w);
        assert_abs_diff_eq!(means[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vars[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vars[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_finite() {
        let mut x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(x.all_finite());
        x[[1, 0]] = f64::INFINITY;
        assert!(!x.all_finite());
    }

    #[test]
    fn test_select_rows_keeps_order() {
        let x = array![[1.0], [2.0], [3.0]];
        let sub = x.select_rows(&[2, 0]);
        assert_eq!(sub, array![[3.0], [1.0]]);
    }
}
