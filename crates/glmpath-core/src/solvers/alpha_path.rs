// =============================================================================
// Alpha Path
// =============================================================================
//
// The regularization path is a DESCENDING sequence of penalty strengths so
// every solve can warm-start from the sparser, more penalized solution
// before it.
//
// ALPHA_MAX
// ---------
// At β = 0 (intercept at its own optimum) the subgradient condition for a
// feature to stay at zero under the L1 penalty is
//
//     |gⱼ| ≤ alpha · l1_ratio · P1ⱼ
//
// where g is the gradient of ½·deviance. The smallest alpha keeping every
// L1-penalized feature at zero is therefore
//
//     alpha_max = maxⱼ |gⱼ| / P1ⱼ  /  max(l1_ratio, 1e-3)
//
// The floor on l1_ratio keeps pure ridge paths finite.
//
// =============================================================================

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::constraints::Constraints;
use crate::diagnostics::NoopObserver;
use crate::error::{GlmPathError, Result};
use crate::families::working_set;
use crate::float::GlmFloat;
use crate::matrix::DesignMatrix;
use crate::regularization::{L2Penalty, Penalty};

use super::irls::{solve_penalized, start_coefficients, GlmProblem};
use super::{SolverConfig, SolverKind};

/// Smallest l1_ratio used when computing alpha_max.
const L1_RATIO_FLOOR: f64 = 1e-3;

/// Default ratio between the last and first alpha of a generated grid.
pub const DEFAULT_MIN_ALPHA_RATIO: f64 = 1e-6;

/// Coefficients of the intercept-only model (all features zero).
fn null_model<F: GlmFloat, M: DesignMatrix<F>>(
    problem: &GlmProblem<'_, F, M>,
    config: &SolverConfig<F>,
) -> Result<Array1<F>> {
    let start = start_coefficients(problem);
    if !problem.fit_intercept {
        return Ok(start);
    }
    let p = problem.x.ncols();
    let pinned = Constraints {
        lower: Array1::zeros(p),
        upper: Array1::zeros(p),
        inequalities: None,
    };
    let null_problem = GlmProblem {
        constraints: &pinned,
        ..*problem
    };
    let penalty = Penalty {
        p1: Array1::zeros(p),
        p2: L2Penalty::Diagonal(Array1::zeros(p)),
    };
    let mut rng = StdRng::seed_from_u64(0);
    let solved = solve_penalized(
        &null_problem,
        &penalty,
        &start,
        config,
        SolverKind::IrlsCd,
        &NoopObserver,
        &mut rng,
    )?;
    Ok(solved.coef)
}

/// Smallest alpha at which every L1-penalized coefficient is zero.
///
/// `p1` holds the base L1 weights in the standardized space. Falls back to
/// 1.0 (with a warning) when the gradient vanishes or no feature carries an
/// L1 weight.
pub fn alpha_max<F: GlmFloat, M: DesignMatrix<F>>(
    problem: &GlmProblem<'_, F, M>,
    p1: &Array1<F>,
    l1_ratio: F,
    config: &SolverConfig<F>,
) -> Result<F> {
    let coef = null_model(problem, config)?;
    let eta = problem
        .x
        .linear_predictor(&coef, problem.fit_intercept, problem.offset);
    let ws = working_set(problem.family, problem.link, problem.y, &eta, problem.weights);
    let grad = problem.x.transpose_matvec(&ws.eta_gradient(&eta));

    let max_ratio = grad
        .iter()
        .zip(p1.iter())
        .filter(|&(_, &p)| p > F::zero())
        .map(|(&g, &p)| g.abs() / p)
        .fold(F::zero(), |acc, v| acc.max(v));
    let alpha = max_ratio / l1_ratio.max(F::lit(L1_RATIO_FLOOR));

    if alpha > F::zero() && alpha.is_finite() {
        Ok(alpha)
    } else {
        log::warn!(
            "alpha_max evaluated to {}; falling back to 1.0 for the alpha grid",
            alpha
        );
        Ok(F::one())
    }
}

/// Geometric grid from `alpha_max` down to the smallest alpha.
///
/// The smallest alpha is `min_alpha` when given, otherwise
/// `alpha_max · min_alpha_ratio` (default 1e-6).
pub fn alpha_grid<F: GlmFloat>(
    alpha_max: F,
    n_alphas: usize,
    min_alpha_ratio: Option<F>,
    min_alpha: Option<F>,
) -> Result<Array1<F>> {
    if n_alphas == 0 {
        return Err(GlmPathError::InvalidValue(
            "n_alphas must be at least 1".to_string(),
        ));
    }
    let smallest = match (min_alpha, min_alpha_ratio) {
        (Some(_), Some(_)) => {
            return Err(GlmPathError::InvalidValue(
                "Only one of min_alpha and min_alpha_ratio may be set".to_string(),
            ))
        }
        (Some(m), None) => {
            if !(m > F::zero()) || m >= alpha_max {
                return Err(GlmPathError::InvalidValue(format!(
                    "min_alpha must be positive and smaller than alpha_max ({}), got {}",
                    alpha_max, m
                )));
            }
            m
        }
        (None, ratio) => {
            let ratio = ratio.unwrap_or_else(|| F::lit(DEFAULT_MIN_ALPHA_RATIO));
            if !(ratio > F::zero() && ratio < F::one()) {
                return Err(GlmPathError::InvalidValue(format!(
                    "min_alpha_ratio must be in (0, 1), got {}",
                    ratio
                )));
            }
            alpha_max * ratio
        }
    };

    if n_alphas == 1 {
        return Ok(Array1::from_elem(1, alpha_max));
    }
    let (log_hi, log_lo) = (alpha_max.ln(), smallest.ln());
    let last = F::from_usize(n_alphas - 1).unwrap_or_else(F::one);
    let mut grid: Array1<F> = (0..n_alphas)
        .map(|i| {
            let frac = F::from_usize(i).unwrap_or_else(F::zero) / last;
            (log_hi + frac * (log_lo - log_hi)).exp()
        })
        .collect();
    grid[0] = alpha_max;
    grid[n_alphas - 1] = smallest;
    Ok(grid)
}

/// Caller-supplied alphas, sorted descending and repeated for every l1_ratio.
pub fn explicit_alpha_grid<F: GlmFloat>(alphas: &[F], n_l1_ratios: usize) -> Result<Array2<F>> {
    if alphas.is_empty() {
        return Err(GlmPathError::EmptyInput("alphas is empty".to_string()));
    }
    if let Some(bad) = alphas.iter().find(|&&a| !(a >= F::zero()) || !a.is_finite()) {
        return Err(GlmPathError::InvalidValue(format!(
            "alphas must be finite and non-negative, got {}",
            bad
        )));
    }
    let mut sorted = alphas.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let row = Array1::from(sorted);
    let mut grid = Array2::zeros((n_l1_ratios, row.len()));
    for mut r in grid.rows_mut() {
        r.assign(&row);
    }
    Ok(grid)
}
