// =============================================================================
// Path Runner
// =============================================================================
//
// Solves one descending alpha grid for one l1_ratio on one data set,
// warm-starting every point from the previous solution:
//
//     standardize X (with the given weights)
//     for alpha in alphas (descending):
//         solve at (alpha, l1_ratio) starting from the previous coefficients
//         unstandardize
//
// `run_fold_path` wraps this for a cross-validation job: it slices the fold's
// training rows, renormalizes training and test weights to sum to one each,
// and scores every path point by its held-out deviance.
//
// =============================================================================

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::constraints::Constraints;
use crate::diagnostics::{FitObserver, PathPointEvent, PenaltyCheck, PenaltyCheckStage};
use crate::error::{GlmPathError, Result};
use crate::families::Family;
use crate::float::GlmFloat;
use crate::links::Link;
use crate::matrix::DesignMatrix;
use crate::regularization::{L2Penalty, RegularizationConfig};
use crate::standardize::{join_coef, split_coef, standardize, ColumnScaling};

use super::irls::{solve_penalized, start_coefficients, GlmProblem};
use super::SolverConfig;

/// Everything shared by all paths of one cross-validated fit.
///
/// Penalties and constraints are given on the original scale, with P1 / P2
/// not yet multiplied by alpha or the l1_ratio.
pub struct PathSetup<'a, F: GlmFloat> {
    pub family: &'a dyn Family<F>,
    pub link: &'a dyn Link<F>,
    pub fit_intercept: bool,
    pub center_predictors: bool,
    pub scale_predictors: bool,
    pub p1: &'a Array1<F>,
    pub p2: &'a L2Penalty<F>,
    pub constraints: &'a Constraints<F>,
    /// Original-scale start values, intercept first when fitted.
    pub start_params: Option<&'a Array1<F>>,
    pub solver: &'a SolverConfig<F>,
    pub observer: &'a dyn FitObserver,
}

/// Position of a path inside the cross-validation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCoords {
    /// `None` for the final full-data refit.
    pub fold: Option<usize>,
    pub l1_index: usize,
}

/// One solved path point on the original scale.
#[derive(Debug, Clone)]
pub struct PathPoint<F: GlmFloat> {
    pub alpha: F,
    pub intercept: F,
    pub coef: Array1<F>,
    pub n_iter: usize,
    pub converged: bool,
}

/// A solved path plus the column statistics it was standardized with.
#[derive(Debug, Clone)]
pub struct SolvedPath<F: GlmFloat> {
    pub points: Vec<PathPoint<F>>,
    pub scaling: ColumnScaling<F>,
}

/// Solve a descending alpha grid with warm starts.
///
/// # Arguments
/// * `x`, `y`, `offset` - the data to fit
/// * `weights` - sample weights summing to one
/// * `l1_ratio` - L1 / L2 mix shared by all points
/// * `alphas` - penalty strengths, descending
///
/// # Returns
/// One `PathPoint` per alpha, in grid order.
#[allow(clippy::too_many_arguments)]
pub fn solve_path<F: GlmFloat, M: DesignMatrix<F>>(
    setup: &PathSetup<'_, F>,
    x: &M,
    y: &Array1<F>,
    weights: &Array1<F>,
    offset: Option<&Array1<F>>,
    l1_ratio: F,
    alphas: &[F],
    coords: PathCoords,
) -> Result<SolvedPath<F>> {
    let st = standardize(
        x,
        weights,
        setup.fit_intercept && setup.center_predictors,
        setup.scale_predictors,
        setup.p1,
        setup.p2,
        setup.constraints,
    );
    setup.observer.on_penalty_check(&PenaltyCheck {
        stage: PenaltyCheckStage::AfterStandardization,
        fold: coords.fold,
        l1_index: Some(coords.l1_index),
        positive_semidefinite: st.p2.is_positive_semidefinite(),
    });

    let problem = GlmProblem {
        x: &st.x,
        y,
        weights,
        offset,
        family: setup.family,
        link: setup.link,
        fit_intercept: setup.fit_intercept,
        constraints: &st.constraints,
    };

    let has_l1 = l1_ratio > F::zero() && st.p1.iter().any(|&p| p > F::zero());
    let kind = setup
        .solver
        .resolve_kind(has_l1, setup.constraints.is_active())?;

    let mut coef = match setup.start_params {
        Some(start) => {
            let (intercept, beta) = split_coef(start, setup.fit_intercept);
            let (intercept, mut beta) = st.scaling.standardize_coefficients(intercept, &beta);
            st.constraints.project_bounds(&mut beta);
            join_coef(intercept, &beta, setup.fit_intercept)
        }
        None => start_coefficients(&problem),
    };

    let mut rng = match setup.solver.random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut points = Vec::with_capacity(alphas.len());
    for &alpha in alphas {
        let penalty = RegularizationConfig::elastic_net(alpha, l1_ratio).apply(&st.p1, &st.p2);
        let solved = solve_penalized(
            &problem,
            &penalty,
            &coef,
            setup.solver,
            kind,
            setup.observer,
            &mut rng,
        )?;
        let converged = solved.converged();
        coef = solved.coef;

        let (intercept_s, beta_s) = split_coef(&coef, setup.fit_intercept);
        let (intercept, beta) = st.scaling.unstandardize(intercept_s, &beta_s);
        points.push(PathPoint {
            alpha,
            intercept: if setup.fit_intercept { intercept } else { F::zero() },
            coef: beta,
            n_iter: solved.n_iter,
            converged,
        });
    }

    Ok(SolvedPath {
        points,
        scaling: st.scaling,
    })
}

// =============================================================================
// Cross-validation job
// =============================================================================

/// Train / test rows of one job.
#[derive(Debug, Clone, Copy)]
pub struct FoldJob<'a> {
    pub fold: usize,
    pub l1_index: usize,
    pub train: &'a [usize],
    pub test: &'a [usize],
}

/// Per-alpha arrays of one (fold, l1_ratio) job.
#[derive(Debug, Clone)]
pub struct PathResult<F: GlmFloat> {
    pub fold: usize,
    pub l1_index: usize,
    /// Shape (n_alphas,).
    pub intercepts: Array1<F>,
    /// Shape (n_alphas, n_features).
    pub coefs: Array2<F>,
    /// Held-out deviance, shape (n_alphas,).
    pub deviances: Array1<F>,
    pub n_iters: Array1<usize>,
    pub converged: Vec<bool>,
    pub train_indices: Vec<usize>,
}

/// Rows `idx` of a vector.
fn take<F: GlmFloat>(v: &Array1<F>, idx: &[usize]) -> Array1<F> {
    v.select(Axis(0), idx)
}

/// Rescale weights to sum to one.
fn normalized<F: GlmFloat>(w: Array1<F>, what: &str) -> Result<Array1<F>> {
    let total = w.sum();
    if !(total > F::zero()) {
        return Err(GlmPathError::InvalidValue(format!(
            "{} weights sum to {}; every fold needs positive total weight",
            what, total
        )));
    }
    Ok(w / total)
}

/// Fit one regularization path on a fold's training rows and score it on
/// the fold's test rows.
///
/// `weights` are the raw (full-data) sample weights.
#[allow(clippy::too_many_arguments)]
pub fn run_fold_path<F: GlmFloat, M: DesignMatrix<F>>(
    setup: &PathSetup<'_, F>,
    x: &M,
    y: &Array1<F>,
    weights: &Array1<F>,
    offset: Option<&Array1<F>>,
    l1_ratio: F,
    alphas: &[F],
    job: FoldJob<'_>,
) -> Result<PathResult<F>> {
    let x_train = x.select_rows(job.train);
    let y_train = take(y, job.train);
    let w_train = normalized(take(weights, job.train), "training")?;
    let offset_train = offset.map(|o| take(o, job.train));

    let x_test = x.select_rows(job.test);
    let y_test = take(y, job.test);
    // test weights must sum to one too, or deviances are not comparable across folds
    let w_test = normalized(take(weights, job.test), "test")?;
    let offset_test = offset.map(|o| take(o, job.test));

    let coords = PathCoords {
        fold: Some(job.fold),
        l1_index: job.l1_index,
    };
    let solved = solve_path(
        setup,
        &x_train,
        &y_train,
        &w_train,
        offset_train.as_ref(),
        l1_ratio,
        alphas,
        coords,
    )?;

    let n_alphas = alphas.len();
    let n_features = x.ncols();
    let mut intercepts = Array1::zeros(n_alphas);
    let mut coefs = Array2::zeros((n_alphas, n_features));
    let mut deviances = Array1::zeros(n_alphas);
    let mut n_iters = Array1::zeros(n_alphas);
    let mut converged = Vec::with_capacity(n_alphas);

    for (k, point) in solved.points.iter().enumerate() {
        let mut eta = x_test.matvec(&point.coef);
        eta.mapv_inplace(|e| e + point.intercept);
        if let Some(o) = &offset_test {
            eta += o;
        }
        let mu = setup.link.inverse(&eta);
        let deviance = setup.family.deviance(&y_test, &mu, Some(&w_test));

        intercepts[k] = point.intercept;
        coefs.row_mut(k).assign(&point.coef);
        deviances[k] = deviance;
        n_iters[k] = point.n_iter;
        converged.push(point.converged);

        setup.observer.on_path_point(&PathPointEvent {
            fold: Some(job.fold),
            l1_index: job.l1_index,
            alpha_index: k,
            alpha: point.alpha.as_f64(),
            deviance: deviance.as_f64(),
            n_iter: point.n_iter,
            converged: point.converged,
        });
    }
    log::debug!(
        "fold {} / l1 #{}: {} alphas, held-out deviance {:.6e} .. {:.6e}",
        job.fold,
        job.l1_index,
        n_alphas,
        deviances.first().map_or(f64::NAN, |d| d.as_f64()),
        deviances.last().map_or(f64::NAN, |d| d.as_f64())
    );

    Ok(PathResult {
        fold: job.fold,
        l1_index: job.l1_index,
        intercepts,
        coefs,
        deviances,
        n_iters,
        converged,
        train_indices: job.train.to_vec(),
    })
}
