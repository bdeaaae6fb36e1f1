// =============================================================================
// Standardization
// =============================================================================
//
// Every solve runs on a column-standardized design:
//
//     Xs[:, j] = (X[:, j] − m_j) / s_j
//
// with weighted means m (zero when not centering) and weighted standard
// deviations s (one for constant columns). The transformed matrix is never
// materialized. `StandardizedMatrix` keeps a reference to X together with the
// shift vector m and the multiplier vector c = 1/s, and expresses every product
// the solvers need through products with X itself:
//
//     Xs · β       = X (c∘β) − (mᵀ(c∘β)) 1
//     Xsᵀ · r      = c ∘ (Xᵀr − m Σr)
//     Xsᵀ D Xs     = C (S − m vᵀ − v mᵀ + σ m mᵀ) C
//                    where S = XᵀDX, v = XᵀD1, σ = Σd, C = diag(c)
//
// so a sparse X stays sparse even when centered.
//
// Coefficients live in the standardized space during solving. With β = c∘βs
// the penalties and constraints are re-expressed as
//
//     P1' = c ∘ P1        P2' = C P2 C
//     lower' = lower · s  upper' = upper · s
//     A' = A C
//
// unless the penalties are meant to act on the standardized coefficients
// themselves, in which case P1 and P2 pass through unchanged.
//
// =============================================================================

use ndarray::{Array1, Array2, Axis};

use crate::constraints::{Constraints, LinearInequalities};
use crate::float::GlmFloat;
use crate::matrix::DesignMatrix;
use crate::regularization::L2Penalty;

/// Column statistics used to standardize one design matrix.
#[derive(Debug, Clone)]
pub struct ColumnScaling<F: GlmFloat> {
    /// Weighted column means (zeros when not centering).
    pub col_means: Array1<F>,
    /// Weighted column standard deviations (ones for constant columns).
    pub col_stds: Array1<F>,
}

impl<F: GlmFloat> ColumnScaling<F> {
    /// Identity transformation.
    pub fn identity(n_features: usize) -> Self {
        Self {
            col_means: Array1::zeros(n_features),
            col_stds: Array1::ones(n_features),
        }
    }

    /// Multipliers 1 / s_j.
    pub fn multipliers(&self) -> Array1<F> {
        self.col_stds.mapv(|s| F::one() / s)
    }

    /// Map standardized (intercept, coefficients) back to the original scale.
    pub fn unstandardize(&self, intercept: F, coef: &Array1<F>) -> (F, Array1<F>) {
        let original = coef / &self.col_stds;
        let intercept = intercept - self.col_means.dot(&original);
        (intercept, original)
    }

    /// Map original-scale (intercept, coefficients) into the standardized space.
    pub fn standardize_coefficients(&self, intercept: F, coef: &Array1<F>) -> (F, Array1<F>) {
        let scaled = coef * &self.col_stds;
        let intercept = intercept + self.col_means.dot(coef);
        (intercept, scaled)
    }
}

/// A design matrix viewed through a column shift and multiplier.
#[derive(Debug, Clone)]
pub struct StandardizedMatrix<'a, F: GlmFloat, M: DesignMatrix<F>> {
    x: &'a M,
    shift: Array1<F>,
    mult: Array1<F>,
}

impl<'a, F: GlmFloat, M: DesignMatrix<F>> StandardizedMatrix<'a, F, M> {
    pub fn new(x: &'a M, scaling: &ColumnScaling<F>) -> Self {
        Self {
            x,
            shift: scaling.col_means.clone(),
            mult: scaling.multipliers(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    /// Xs · β
    pub fn matvec(&self, beta: &Array1<F>) -> Array1<F> {
        let u = beta * &self.mult;
        let correction = self.shift.dot(&u);
        let mut out = self.x.matvec(&u);
        if correction != F::zero() {
            out.mapv_inplace(|v| v - correction);
        }
        out
    }

    /// Xsᵀ · r
    pub fn transpose_matvec(&self, r: &Array1<F>) -> Array1<F> {
        let total = r.sum();
        let xtr = self.x.transpose_matvec(r);
        let mut out = Array1::zeros(self.ncols());
        for j in 0..self.ncols() {
            out[j] = self.mult[j] * (xtr[j] - self.shift[j] * total);
        }
        out
    }

    /// Xsᵀ · diag(d) · Xs
    pub fn sandwich(&self, d: &Array1<F>) -> Array2<F> {
        let mut s = self.x.sandwich(d);
        let centered = self.shift.iter().any(|&m| m != F::zero());
        if centered {
            let v = self.x.transpose_matvec(d);
            let sigma = d.sum();
            for ((j, k), val) in s.indexed_iter_mut() {
                let (mj, mk) = (self.shift[j], self.shift[k]);
                *val = *val - mj * v[k] - v[j] * mk + sigma * mj * mk;
            }
        }
        let m = &self.mult;
        for ((j, k), val) in s.indexed_iter_mut() {
            *val = *val * m[j] * m[k];
        }
        s
    }

    /// Linear predictor η = [intercept] + Xs·β + offset.
    ///
    /// `coef` carries the intercept at position 0 when `fit_intercept`.
    pub fn linear_predictor(
        &self,
        coef: &Array1<F>,
        fit_intercept: bool,
        offset: Option<&Array1<F>>,
    ) -> Array1<F> {
        let (intercept, beta) = split_coef(coef, fit_intercept);
        let mut eta = self.matvec(&beta);
        if intercept != F::zero() {
            eta.mapv_inplace(|e| e + intercept);
        }
        if let Some(off) = offset {
            eta += off;
        }
        eta
    }
}

/// Split a full coefficient vector into (intercept, features).
pub fn split_coef<F: GlmFloat>(coef: &Array1<F>, fit_intercept: bool) -> (F, Array1<F>) {
    if fit_intercept {
        (coef[0], coef.slice(ndarray::s![1..]).to_owned())
    } else {
        (F::zero(), coef.clone())
    }
}

/// Join (intercept, features) into a full coefficient vector.
pub fn join_coef<F: GlmFloat>(intercept: F, beta: &Array1<F>, fit_intercept: bool) -> Array1<F> {
    if fit_intercept {
        let mut out = Array1::zeros(beta.len() + 1);
        out[0] = intercept;
        out.slice_mut(ndarray::s![1..]).assign(beta);
        out
    } else {
        beta.clone()
    }
}

/// Everything a solve needs, expressed in standardized coordinates.
#[derive(Debug, Clone)]
pub struct Standardized<'a, F: GlmFloat, M: DesignMatrix<F>> {
    pub x: StandardizedMatrix<'a, F, M>,
    pub scaling: ColumnScaling<F>,
    /// Base L1 weights in standardized space.
    pub p1: Array1<F>,
    /// Base L2 matrix in standardized space.
    pub p2: L2Penalty<F>,
    pub constraints: Constraints<F>,
}

/// Standardize X and carry penalties and constraints into the new space.
///
/// # Arguments
/// * `weights` - sample weights summing to one
/// * `center` - subtract weighted column means (only meaningful with an intercept)
/// * `penalize_scaled` - apply P1 / P2 to the standardized coefficients as given
pub fn standardize<'a, F: GlmFloat, M: DesignMatrix<F>>(
    x: &'a M,
    weights: &Array1<F>,
    center: bool,
    penalize_scaled: bool,
    p1: &Array1<F>,
    p2: &L2Penalty<F>,
    constraints: &Constraints<F>,
) -> Standardized<'a, F, M> {
    let (means, vars) = x.weighted_col_moments(weights);
    let col_stds = vars.mapv(|v| {
        let s = v.sqrt();
        if s > F::zero() && s.is_finite() {
            s
        } else {
            F::one()
        }
    });
    let col_means = if center {
        means
    } else {
        Array1::zeros(x.ncols())
    };
    let scaling = ColumnScaling {
        col_means,
        col_stds,
    };
    let mult = scaling.multipliers();

    let (p1, p2) = if penalize_scaled {
        (p1.clone(), p2.clone())
    } else {
        (p1 * &mult, p2.congruence(&mult))
    };

    let inequalities = constraints.inequalities.as_ref().map(|ineq| LinearInequalities {
        a: &ineq.a * &mult.view().insert_axis(Axis(0)),
        b: ineq.b.clone(),
    });
    let constraints = Constraints {
        lower: &constraints.lower * &scaling.col_stds,
        upper: &constraints.upper * &scaling.col_stds,
        inequalities,
    };

    Standardized {
        x: StandardizedMatrix::new(x, &scaling),
        scaling,
        p1,
        p2,
        constraints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CscMatrix;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn design() -> Array2<f64> {
        array![
            [1.0, 0.0, 5.0],
            [2.0, 0.0, 5.0],
            [0.0, 3.0, 5.0],
            [4.0, 1.0, 5.0],
            [3.0, 0.0, 5.0]
        ]
    }

    fn explicit(x: &Array2<f64>, scaling: &ColumnScaling<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for ((_, j), v) in out.indexed_iter_mut() {
            *v = (*v - scaling.col_means[j]) / scaling.col_stds[j];
        }
        out
    }

    fn setup(center: bool) -> (Array2<f64>, Array1<f64>, ColumnScaling<f64>) {
        let x = design();
        let w = array![0.1, 0.3, 0.2, 0.2, 0.2];
        let c = Constraints::unconstrained(3);
        let scaling = {
            let st = standardize(
                &x,
                &w,
                center,
                false,
                &Array1::ones(3),
                &L2Penalty::Diagonal(Array1::ones(3)),
                &c,
            );
            st.scaling.clone()
        };
        (x, w, scaling)
    }

    #[test]
    fn test_centered_columns_have_zero_mean_unit_variance() {
        let (x, w, scaling) = setup(true);
        let xs = explicit(&x, &scaling);
        for j in 0..2 {
            let col = xs.column(j);
            let mean: f64 = col.iter().zip(w.iter()).map(|(a, b)| a * b).sum();
            let var: f64 = col.iter().zip(w.iter()).map(|(a, b)| a * a * b).sum();
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
        }
        // constant column keeps scale one
        assert_abs_diff_eq!(scaling.col_stds[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_implicit_products_match_explicit_matrix() {
        for center in [true, false] {
            let (x, _, scaling) = setup(center);
            let xs = explicit(&x, &scaling);
            let view = StandardizedMatrix::new(&x, &scaling);
            let beta = array![0.5, -1.0, 2.0];
            let r = array![1.0, -2.0, 0.5, 0.0, 3.0];
            let d = array![0.5, 0.0, 1.0, 2.0, 0.25];

            let a = view.matvec(&beta);
            let b = xs.dot(&beta);
            let at = view.transpose_matvec(&r);
            let bt = xs.t().dot(&r);
            let s = view.sandwich(&d);
            let sd = xs.t().dot(&(&xs * &d.view().insert_axis(Axis(1))));
            for i in 0..5 {
                assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-10);
            }
            for j in 0..3 {
                assert_abs_diff_eq!(at[j], bt[j], epsilon = 1e-10);
                for k in 0..3 {
                    assert_abs_diff_eq!(s[[j, k]], sd[[j, k]], epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_unstandardize_reproduces_predictions() {
        for center in [true, false] {
            let (x, _, scaling) = setup(center);
            let view = StandardizedMatrix::new(&x, &scaling);
            let coef_s = array![0.7, 0.2, -0.4, 1.1];
            let eta_s = view.linear_predictor(&coef_s, true, None);
            let (intercept, coef) = scaling.unstandardize(coef_s[0], &split_coef(&coef_s, true).1);
            let eta = x.dot(&coef).mapv(|e| e + intercept);
            for i in 0..5 {
                assert_abs_diff_eq!(eta_s[i], eta[i], epsilon = 1e-10);
            }
            let (i_back, c_back) = scaling.standardize_coefficients(intercept, &coef);
            assert_abs_diff_eq!(i_back, coef_s[0], epsilon = 1e-10);
            for j in 0..3 {
                assert_abs_diff_eq!(c_back[j], coef_s[j + 1], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_penalties_and_bounds_follow_the_scaling() {
        let x = design();
        let w = Array1::from_elem(5, 0.2);
        let lo = array![-1.0, 0.0, -2.0];
        let a = array![[1.0, 1.0, 1.0]];
        let b = array![1.0];
        let c = Constraints::new(3, Some(&lo), None, Some(&a), Some(&b)).unwrap();
        let st = standardize(
            &x,
            &w,
            true,
            false,
            &array![1.0, 2.0, 3.0],
            &L2Penalty::Diagonal(Array1::ones(3)),
            &c,
        );
        let s = &st.scaling.col_stds;
        for j in 0..3 {
            assert_abs_diff_eq!(st.p1[j], (j as f64 + 1.0) / s[j], epsilon = 1e-12);
            assert_abs_diff_eq!(st.constraints.lower[j], lo[j] * s[j], epsilon = 1e-12);
        }
        let ineq = st.constraints.inequalities.as_ref().unwrap();
        assert_abs_diff_eq!(ineq.a[[0, 0]], 1.0 / s[0], epsilon = 1e-12);

        let scaled_model = standardize(
            &x,
            &w,
            true,
            true,
            &array![1.0, 2.0, 3.0],
            &L2Penalty::Diagonal(Array1::ones(3)),
            &c,
        );
        assert_eq!(scaled_model.p1, array![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sparse_input_stays_consistent() {
        let x = design();
        let sx = CscMatrix::from_dense(&x);
        let w = Array1::from_elem(5, 0.2);
        let c = Constraints::unconstrained(3);
        let p2 = L2Penalty::Diagonal(Array1::ones(3));
        let dense = standardize(&x, &w, true, false, &Array1::ones(3), &p2, &c);
        let sparse = standardize(&sx, &w, true, false, &Array1::ones(3), &p2, &c);
        let beta = array![1.0, 2.0, 3.0];
        let a = dense.x.matvec(&beta);
        let b = sparse.x.matvec(&beta);
        for i in 0..5 {
            assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-12);
        }
    }
}
