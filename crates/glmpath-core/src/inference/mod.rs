// =============================================================================
// Covariance of the Final Fit
// =============================================================================
//
// Computed on the ORIGINAL (unstandardized) design at the reported
// coefficients, with the caller's raw sample weights. X̃ = [1 | X] when an
// intercept is fitted.
//
// INFORMATION
// -----------
// Observed information uses the per-row weight
//
//     Wᵢ = wᵢ [ μ'² / V − (yᵢ − μᵢ) (μ'' / V − μ'² V' / V²) ]
//
// with μ' = dμ/dη, μ'' = d²μ/dη², V' = dV/dμ. Expected (Fisher) information
// drops the residual term: Wᵢ = wᵢ μ'² / V. For a canonical link the two
// are identical. Either way I = X̃ᵀ W X̃.
//
// ESTIMATORS
// ----------
//     classical        Cov = φ · I⁻¹
//     robust (HC0)     Cov = I⁻¹ · (Σᵢ sᵢ² x̃ᵢ x̃ᵢᵀ) · I⁻¹
//     clustered        Cov = I⁻¹ · (Σ_c g_c g_cᵀ) · I⁻¹,   g_c = Σ_{i ∈ c} sᵢ x̃ᵢ
//
// where sᵢ = wᵢ (yᵢ − μᵢ) μ'ᵢ / V(μᵢ) is the score contribution of row i
// and φ is the Pearson dispersion
//
//     φ = Σ wᵢ (yᵢ − μᵢ)² / V(μᵢ)  /  (Σ wᵢ − k)
//
// with k the number of estimated coefficients (intercept included).
//
// The penalty is ignored: this is the covariance of the unpenalized model
// evaluated at the penalized estimate.
//
// =============================================================================

use std::collections::BTreeMap;

use ndarray::{s, Array1, Array2, Axis};

use crate::error::{GlmPathError, Result};
use crate::families::Family;
use crate::float::GlmFloat;
use crate::links::Link;
use crate::matrix::DesignMatrix;

/// Which covariance estimate to compute.
#[derive(Debug, Clone, Copy, Default)]
pub struct CovarianceOptions<'a> {
    /// HC0 sandwich instead of the classical estimate.
    pub robust: bool,

    /// Cluster label of every row. Scores are summed within a cluster
    /// before forming the sandwich; takes precedence over `robust`.
    pub clusters: Option<&'a [usize]>,

    /// Use the Fisher information instead of the observed one.
    pub expected_information: bool,
}

/// X̃ᵀ diag(d) X̃ with an optional leading column of ones.
fn augmented_sandwich<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    d: &Array1<F>,
    fit_intercept: bool,
) -> Array2<F> {
    let core = x.sandwich(d);
    if !fit_intercept {
        return core;
    }
    let p = x.ncols();
    let cross = x.transpose_matvec(d);
    let mut out = Array2::zeros((p + 1, p + 1));
    out[[0, 0]] = d.sum();
    out.slice_mut(s![0, 1..]).assign(&cross);
    out.slice_mut(s![1.., 0]).assign(&cross);
    out.slice_mut(s![1.., 1..]).assign(&core);
    out
}

/// Σ_c g_c g_cᵀ with g_c the summed score of cluster c.
fn cluster_meat<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    score: &Array1<F>,
    clusters: &[usize],
    fit_intercept: bool,
) -> Array2<F> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &c) in clusters.iter().enumerate() {
        groups.entry(c).or_default().push(i);
    }

    let offset = usize::from(fit_intercept);
    let k = x.ncols() + offset;
    let mut meat = Array2::zeros((k, k));
    for rows in groups.values() {
        let scores: Array1<F> = rows.iter().map(|&i| score[i]).collect();
        let mut g = Array1::zeros(k);
        if fit_intercept {
            g[0] = scores.sum();
        }
        g.slice_mut(s![offset..])
            .assign(&x.select_rows(rows).transpose_matvec(&scores));
        let col = g.view().insert_axis(Axis(1));
        meat += &col.dot(&col.t());
    }
    meat
}

/// Covariance matrix of (intercept, coef), intercept first when fitted.
///
/// # Arguments
/// * `weights` - raw sample weights (not normalized)
/// * `options` - estimator choice, see `CovarianceOptions`
///
/// # Returns
/// A (k × k) matrix, k = number of features plus one when an intercept is
/// fitted.
#[allow(clippy::too_many_arguments)]
pub fn covariance_matrix<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    y: &Array1<F>,
    weights: &Array1<F>,
    offset: Option<&Array1<F>>,
    family: &dyn Family<F>,
    link: &dyn Link<F>,
    intercept: F,
    coef: &Array1<F>,
    fit_intercept: bool,
    options: &CovarianceOptions<'_>,
) -> Result<Array2<F>> {
    let n = y.len();
    if let Some(clusters) = options.clusters {
        if clusters.len() != n {
            return Err(GlmPathError::DimensionMismatch(format!(
                "clusters has {} elements but y has {}",
                clusters.len(),
                n
            )));
        }
    }

    let mut eta = x.matvec(coef);
    eta.mapv_inplace(|e| e + intercept);
    if let Some(o) = offset {
        eta += o;
    }
    let mu = family.clamp_mu(&link.inverse(&eta));
    let dmu = link.inverse_derivative(&eta);
    let var = family.variance(&mu);
    let (d2mu, dvar) = if options.expected_information {
        (Array1::zeros(n), Array1::zeros(n))
    } else {
        (link.inverse_second_derivative(&eta), family.variance_derivative(&mu))
    };

    let mut info_w = Array1::zeros(n);
    let mut score = Array1::zeros(n);
    let mut pearson = F::zero();
    for i in 0..n {
        let v = var[i].max(F::min_positive_value());
        let resid = y[i] - mu[i];
        let fisher = dmu[i] * dmu[i] / v;
        let curvature = d2mu[i] / v - dmu[i] * dmu[i] * dvar[i] / (v * v);
        info_w[i] = weights[i] * (fisher - resid * curvature);
        score[i] = weights[i] * resid * dmu[i] / v;
        pearson += weights[i] * resid * resid / v;
    }

    let information = augmented_sandwich(x, &info_w, fit_intercept);
    let inverse = F::invert_symmetric(&information).ok_or_else(|| {
        GlmPathError::LinearAlgebraError(
            "information matrix is singular; cannot compute the covariance matrix".to_string(),
        )
    })?;

    if let Some(clusters) = options.clusters {
        let meat = cluster_meat(x, &score, clusters, fit_intercept);
        return Ok(inverse.dot(&meat).dot(&inverse));
    }
    if options.robust {
        let meat = augmented_sandwich(x, &score.mapv(|v| v * v), fit_intercept);
        return Ok(inverse.dot(&meat).dot(&inverse));
    }

    let k = F::from_usize(coef.len() + usize::from(fit_intercept)).unwrap_or_else(F::zero);
    let dof = weights.sum() - k;
    if !(dof > F::zero()) {
        return Err(GlmPathError::InvalidValue(format!(
            "total sample weight {} does not exceed the number of coefficients",
            weights.sum()
        )));
    }
    let phi = pearson / dof;
    Ok(inverse * phi)
}
