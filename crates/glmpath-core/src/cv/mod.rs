// =============================================================================
// Cross-Validated Regularization Paths
// =============================================================================
//
// The orchestrator ties everything together:
//
//   1. Validate every input up front (shapes, l1_ratios, alphas, P1 / P2,
//      constraints, family support, fold weights). Nothing is dispatched
//      until the whole configuration is known to be usable.
//   2. Build one descending alpha grid per l1_ratio (on the full data), or
//      tile the caller's explicit alphas.
//   3. Run one Path Runner job per (fold, l1_ratio) on the rayon pool.
//      Jobs share read-only references and return plain result structs.
//   4. Reassemble results by their (fold, l1_ratio) tags into
//      (fold, l1_ratio, alpha[, feature]) arrays, average the held-out
//      deviance over folds and take the first minimum in row-major order.
//   5. Refit at the winning (l1_ratio, alpha) on the full data and, if
//      asked, compute the covariance matrix of that fit.
//
// Any job error aborts the whole call. Hitting max_iter is not an error.
//
// =============================================================================

mod folds;

pub use folds::{validate_fold, CvSpec, ExplicitFolds, Fold, FoldSplitter, KFold};

use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, Axis};
use rayon::prelude::*;

use crate::constraints::Constraints;
use crate::diagnostics::{
    FitObserver, NoopObserver, PathPointEvent, PenaltyCheck, PenaltyCheckStage,
};
use crate::error::{GlmPathError, Result};
use crate::families::{Family, FamilySpec};
use crate::float::GlmFloat;
use crate::inference::{covariance_matrix, CovarianceOptions};
use crate::links::{Link, LinkSpec};
use crate::matrix::DesignMatrix;
use crate::regularization::{resolve_p1, resolve_p2, L2Penalty, P1Spec, P2Spec};
use crate::solvers::{
    alpha_grid, alpha_max, explicit_alpha_grid, run_fold_path, solve_path, FoldJob, GlmProblem,
    PathCoords, PathResult, PathSetup, SolverConfig,
};
use crate::standardize::standardize;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a cross-validated elastic-net GLM fit.
#[derive(Clone)]
pub struct GlmCvConfig<F: GlmFloat> {
    pub family: FamilySpec,

    /// `LinkSpec::Auto` picks the family's default link.
    pub link: LinkSpec,

    /// L1 / L2 mixing ratios to try, each in [0, 1].
    /// Default: [0.0]
    pub l1_ratios: Vec<F>,

    /// Explicit penalty strengths. When set, no grid is generated.
    /// Default: None
    pub alphas: Option<Vec<F>>,

    /// Length of each generated alpha grid.
    /// Default: 100
    pub n_alphas: usize,

    /// Last / first alpha of a generated grid. `None` means 1e-6.
    pub min_alpha_ratio: Option<F>,

    /// Absolute end of a generated grid. Exclusive with `min_alpha_ratio`.
    pub min_alpha: Option<F>,

    pub p1: P1Spec<F>,
    pub p2: P2Spec<F>,

    /// Default: true
    pub fit_intercept: bool,

    /// Center the columns internally. Only honored with an intercept.
    /// Default: true
    pub center_predictors: bool,

    /// Apply P1 / P2 to the standardized coefficients instead of the
    /// original ones.
    /// Default: false
    pub scale_predictors: bool,

    pub lower_bounds: Option<Array1<F>>,
    pub upper_bounds: Option<Array1<F>>,

    /// Inequality system A·w ≤ b on the (original-scale) feature coefficients.
    pub a_ineq: Option<Array2<F>>,
    pub b_ineq: Option<Array1<F>>,

    /// Default: 5-fold, no shuffle
    pub cv: CvSpec,

    /// Worker threads. `None` uses the global rayon pool.
    pub n_jobs: Option<usize>,

    /// Reject a P2 that is not positive semidefinite.
    /// Default: true
    pub check_input: bool,

    /// Original-scale start values, intercept first when fitted.
    pub start_params: Option<Array1<F>>,

    /// Default: false
    pub store_covariance_matrix: bool,

    /// HC0 sandwich instead of the classical covariance.
    /// Default: false
    pub robust: bool,

    /// Cluster label per sample for cluster-robust standard errors.
    /// Default: None
    pub clusters: Option<Vec<usize>>,

    /// Fisher instead of observed information in the covariance.
    /// Default: false
    pub expected_information: bool,

    pub solver: SolverConfig<F>,

    pub observer: Arc<dyn FitObserver>,
}

impl<F: GlmFloat> Default for GlmCvConfig<F> {
    fn default() -> Self {
        Self {
            family: FamilySpec::Gaussian,
            link: LinkSpec::Auto,
            l1_ratios: vec![F::zero()],
            alphas: None,
            n_alphas: 100,
            min_alpha_ratio: None,
            min_alpha: None,
            p1: P1Spec::Identity,
            p2: P2Spec::Identity,
            fit_intercept: true,
            center_predictors: true,
            scale_predictors: false,
            lower_bounds: None,
            upper_bounds: None,
            a_ineq: None,
            b_ineq: None,
            cv: CvSpec::default(),
            n_jobs: None,
            check_input: true,
            start_params: None,
            store_covariance_matrix: false,
            robust: false,
            clusters: None,
            expected_information: false,
            solver: SolverConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }
}

impl<F: GlmFloat> fmt::Debug for GlmCvConfig<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlmCvConfig")
            .field("family", &self.family)
            .field("link", &self.link)
            .field("l1_ratios", &self.l1_ratios)
            .field("alphas", &self.alphas)
            .field("n_alphas", &self.n_alphas)
            .field("min_alpha_ratio", &self.min_alpha_ratio)
            .field("min_alpha", &self.min_alpha)
            .field("fit_intercept", &self.fit_intercept)
            .field("center_predictors", &self.center_predictors)
            .field("scale_predictors", &self.scale_predictors)
            .field("cv", &self.cv)
            .field("n_jobs", &self.n_jobs)
            .field("check_input", &self.check_input)
            .field("store_covariance_matrix", &self.store_covariance_matrix)
            .field("robust", &self.robust)
            .field("expected_information", &self.expected_information)
            .field("solver", &self.solver)
            .finish_non_exhaustive()
    }
}

impl<F: GlmFloat> GlmCvConfig<F> {
    pub fn with_family(mut self, family: FamilySpec) -> Self {
        self.family = family;
        self
    }

    pub fn with_link(mut self, link: LinkSpec) -> Self {
        self.link = link;
        self
    }

    pub fn with_l1_ratios(mut self, l1_ratios: Vec<F>) -> Self {
        self.l1_ratios = l1_ratios;
        self
    }

    pub fn with_alphas(mut self, alphas: Vec<F>) -> Self {
        self.alphas = Some(alphas);
        self
    }

    pub fn with_n_alphas(mut self, n_alphas: usize) -> Self {
        self.n_alphas = n_alphas;
        self
    }

    pub fn with_penalties(mut self, p1: P1Spec<F>, p2: P2Spec<F>) -> Self {
        self.p1 = p1;
        self.p2 = p2;
        self
    }

    pub fn with_bounds(mut self, lower: Option<Array1<F>>, upper: Option<Array1<F>>) -> Self {
        self.lower_bounds = lower;
        self.upper_bounds = upper;
        self
    }

    pub fn with_inequalities(mut self, a_ineq: Array2<F>, b_ineq: Array1<F>) -> Self {
        self.a_ineq = Some(a_ineq);
        self.b_ineq = Some(b_ineq);
        self
    }

    pub fn with_cv(mut self, cv: CvSpec) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Request the covariance matrix of the final fit.
    pub fn with_covariance(mut self, robust: bool, clusters: Option<Vec<usize>>) -> Self {
        self.store_covariance_matrix = true;
        self.robust = robust;
        self.clusters = clusters;
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig<F>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn FitObserver>) -> Self {
        self.observer = observer;
        self
    }
}

// =============================================================================
// Result
// =============================================================================

/// Everything reported after a cross-validated fit.
#[derive(Debug, Clone)]
pub struct GlmCvResult<F: GlmFloat> {
    /// Winning penalty strength.
    pub alpha: F,
    /// Winning mixing ratio.
    pub l1_ratio: F,
    pub l1_ratios: Vec<F>,
    /// Alpha grid per l1_ratio, shape (n_l1_ratios, n_alphas), also when
    /// only one ratio was tried. See `alpha_grid` for the 1-D view.
    pub alphas: Array2<F>,
    /// Shape (n_folds, n_l1_ratios, n_alphas, n_features).
    pub coef_path: Array4<F>,
    /// Shape (n_folds, n_l1_ratios, n_alphas).
    pub intercept_path: Array3<F>,
    /// Held-out deviance, shape (n_folds, n_l1_ratios, n_alphas).
    pub deviance_path: Array3<F>,
    pub n_iter_path: Array3<usize>,
    /// Training rows of each job, fold-major.
    pub train_indices: Vec<Vec<usize>>,
    /// Fold-averaged deviance, shape (n_l1_ratios, n_alphas).
    pub avg_deviance: Array2<F>,
    pub best_l1_idx: usize,
    pub best_alpha_idx: usize,
    /// Final coefficients on the original scale.
    pub coef: Array1<F>,
    pub intercept: F,
    /// Column statistics used for the final fit.
    pub col_means: Array1<F>,
    pub col_stds: Array1<F>,
    pub n_iter: usize,
    pub converged: bool,
    pub covariance_matrix: Option<Array2<F>>,
}

impl<F: GlmFloat> GlmCvResult<F> {
    /// The alpha grid as a 1-D array when a single l1_ratio was tried.
    pub fn alpha_grid(&self) -> Option<ArrayView1<'_, F>> {
        (self.alphas.nrows() == 1).then(|| self.alphas.row(0))
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Cross-validated fit with unit sample weights and no offset.
pub fn fit_glm_cv<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    y: &Array1<F>,
    config: &GlmCvConfig<F>,
) -> Result<GlmCvResult<F>> {
    fit_glm_cv_full(x, y, None, None, config)
}

/// Cross-validated fit with optional sample weights and offset, splitting
/// rows as `config.cv` describes.
pub fn fit_glm_cv_full<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    y: &Array1<F>,
    weights: Option<&Array1<F>>,
    offset: Option<&Array1<F>>,
    config: &GlmCvConfig<F>,
) -> Result<GlmCvResult<F>> {
    fit_glm_cv_with_splitter(x, y, weights, offset, config, &config.cv)
}

/// Checked inputs shared by every stage of the fit.
struct Prepared<F: GlmFloat> {
    family: Box<dyn Family<F>>,
    link: Box<dyn Link<F>>,
    weights: Array1<F>,
    weights_norm: Array1<F>,
    p1: Array1<F>,
    p2: L2Penalty<F>,
    constraints: Constraints<F>,
    folds: Vec<Fold>,
}

/// Cross-validated fit with a caller-supplied fold splitter.
///
/// # Arguments
/// * `x` - design matrix (dense or sparse), n_samples × n_features
/// * `y` - response
/// * `weights` - sample weights, unit weights when `None`
/// * `offset` - added to the linear predictor everywhere
/// * `splitter` - produces the (train, test) folds
///
/// # Returns
/// Per-fold paths, the selected hyperparameters and the full-data refit.
pub fn fit_glm_cv_with_splitter<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    y: &Array1<F>,
    weights: Option<&Array1<F>>,
    offset: Option<&Array1<F>>,
    config: &GlmCvConfig<F>,
    splitter: &dyn FoldSplitter,
) -> Result<GlmCvResult<F>> {
    // -------------------------------------------------------------------------
    // Step 1: Validate everything before any fitting work
    // -------------------------------------------------------------------------
    let prep = prepare(x, y, weights, offset, config, splitter)?;
    let n_features = x.ncols();
    let n_folds = prep.folds.len();
    let n_l1 = config.l1_ratios.len();
    let observer: &dyn FitObserver = config.observer.as_ref();

    let setup = PathSetup {
        family: prep.family.as_ref(),
        link: prep.link.as_ref(),
        fit_intercept: config.fit_intercept,
        center_predictors: config.center_predictors,
        scale_predictors: config.scale_predictors,
        p1: &prep.p1,
        p2: &prep.p2,
        constraints: &prep.constraints,
        start_params: config.start_params.as_ref(),
        solver: &config.solver,
        observer,
    };

    // -------------------------------------------------------------------------
    // Step 2: Alpha grids
    // -------------------------------------------------------------------------
    let alphas = match &config.alphas {
        Some(explicit) => explicit_alpha_grid(explicit, n_l1)?,
        None => generated_alpha_grids(x, y, &prep, offset, config)?,
    };
    let n_alphas = alphas.ncols();
    log::info!(
        "cross-validating {} l1_ratio(s) x {} alphas over {} folds ({} jobs)",
        n_l1,
        n_alphas,
        n_folds,
        n_folds * n_l1
    );

    // -------------------------------------------------------------------------
    // Step 3: One path per (fold, l1_ratio), fold-major
    // -------------------------------------------------------------------------
    let jobs: Vec<(usize, usize)> = (0..n_folds)
        .flat_map(|f| (0..n_l1).map(move |l| (f, l)))
        .collect();

    let run_jobs = || -> Result<Vec<PathResult<F>>> {
        jobs.par_iter()
            .map(|&(fold, l1_index)| {
                let alpha_row = alphas.row(l1_index).to_vec();
                run_fold_path(
                    &setup,
                    x,
                    y,
                    &prep.weights,
                    offset,
                    config.l1_ratios[l1_index],
                    &alpha_row,
                    FoldJob {
                        fold,
                        l1_index,
                        train: &prep.folds[fold].train,
                        test: &prep.folds[fold].test,
                    },
                )
            })
            .collect()
    };
    let results = match config.n_jobs {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| GlmPathError::ThreadPool(e.to_string()))?
            .install(run_jobs)?,
        None => run_jobs()?,
    };

    // -------------------------------------------------------------------------
    // Step 4: Reassemble by (fold, l1_ratio) and select
    // -------------------------------------------------------------------------
    let mut coef_path = Array4::zeros((n_folds, n_l1, n_alphas, n_features));
    let mut intercept_path = Array3::zeros((n_folds, n_l1, n_alphas));
    let mut deviance_path = Array3::zeros((n_folds, n_l1, n_alphas));
    let mut n_iter_path = Array3::zeros((n_folds, n_l1, n_alphas));
    let mut train_indices = vec![Vec::new(); n_folds * n_l1];

    for res in results {
        if res.coefs.shape() != [n_alphas, n_features] || res.deviances.len() != n_alphas {
            return Err(GlmPathError::DimensionMismatch(format!(
                "job (fold {}, l1 #{}) returned coefficients of shape {:?}, expected ({}, {})",
                res.fold,
                res.l1_index,
                res.coefs.shape(),
                n_alphas,
                n_features
            )));
        }
        let (f, l) = (res.fold, res.l1_index);
        coef_path
            .index_axis_mut(Axis(0), f)
            .index_axis_mut(Axis(0), l)
            .assign(&res.coefs);
        intercept_path
            .index_axis_mut(Axis(0), f)
            .index_axis_mut(Axis(0), l)
            .assign(&res.intercepts);
        deviance_path
            .index_axis_mut(Axis(0), f)
            .index_axis_mut(Axis(0), l)
            .assign(&res.deviances);
        n_iter_path
            .index_axis_mut(Axis(0), f)
            .index_axis_mut(Axis(0), l)
            .assign(&res.n_iters);
        train_indices[f * n_l1 + l] = res.train_indices;
    }

    let avg_deviance = deviance_path
        .mean_axis(Axis(0))
        .ok_or_else(|| GlmPathError::EmptyInput("no folds".to_string()))?;
    let (best_l1_idx, best_alpha_idx) = argmin_first(&avg_deviance).ok_or_else(|| {
        GlmPathError::InvalidValue(
            "every cross-validated deviance is NaN; cannot select hyperparameters".to_string(),
        )
    })?;
    let best_alpha = alphas[[best_l1_idx, best_alpha_idx]];
    let best_l1 = config.l1_ratios[best_l1_idx];
    log::info!(
        "selected l1_ratio = {}, alpha = {:.6e} (mean deviance {:.6e})",
        best_l1,
        best_alpha.as_f64(),
        avg_deviance[[best_l1_idx, best_alpha_idx]].as_f64()
    );

    // -------------------------------------------------------------------------
    // Step 5: Refit on the full data at the winning point
    // -------------------------------------------------------------------------
    let refit = solve_path(
        &setup,
        x,
        y,
        &prep.weights_norm,
        offset,
        best_l1,
        &[best_alpha],
        PathCoords {
            fold: None,
            l1_index: best_l1_idx,
        },
    )?;
    let scaling = refit.scaling;
    let point = refit.points.into_iter().next().ok_or_else(|| {
        GlmPathError::EmptyInput("final refit produced no path point".to_string())
    })?;
    observer.on_path_point(&PathPointEvent {
        fold: None,
        l1_index: best_l1_idx,
        alpha_index: best_alpha_idx,
        alpha: best_alpha.as_f64(),
        deviance: f64::NAN,
        n_iter: point.n_iter,
        converged: point.converged,
    });

    let covariance = if config.store_covariance_matrix {
        Some(covariance_matrix(
            x,
            y,
            &prep.weights,
            offset,
            prep.family.as_ref(),
            prep.link.as_ref(),
            point.intercept,
            &point.coef,
            config.fit_intercept,
            &CovarianceOptions {
                robust: config.robust,
                clusters: config.clusters.as_deref(),
                expected_information: config.expected_information,
            },
        )?)
    } else {
        None
    };

    Ok(GlmCvResult {
        alpha: best_alpha,
        l1_ratio: best_l1,
        l1_ratios: config.l1_ratios.clone(),
        alphas,
        coef_path,
        intercept_path,
        deviance_path,
        n_iter_path,
        train_indices,
        avg_deviance,
        best_l1_idx,
        best_alpha_idx,
        coef: point.coef,
        intercept: point.intercept,
        col_means: scaling.col_means,
        col_stds: scaling.col_stds,
        n_iter: point.n_iter,
        converged: point.converged,
        covariance_matrix: covariance,
    })
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate inputs and resolve every specification.
fn prepare<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    y: &Array1<F>,
    weights: Option<&Array1<F>>,
    offset: Option<&Array1<F>>,
    config: &GlmCvConfig<F>,
    splitter: &dyn FoldSplitter,
) -> Result<Prepared<F>> {
    let (n, p) = (x.nrows(), x.ncols());
    if n == 0 || p == 0 {
        return Err(GlmPathError::EmptyInput(format!(
            "X has shape ({}, {}); need at least one sample and one feature",
            n, p
        )));
    }
    if y.len() != n {
        return Err(GlmPathError::DimensionMismatch(format!(
            "X has {} rows but y has {} elements",
            n,
            y.len()
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(GlmPathError::InvalidValue("y contains NaN or infinite values".to_string()));
    }
    if !x.all_finite() {
        return Err(GlmPathError::InvalidValue("X contains NaN or infinite values".to_string()));
    }

    let weights = match weights {
        Some(w) => {
            if w.len() != n {
                return Err(GlmPathError::DimensionMismatch(format!(
                    "weights has {} elements but X has {} rows",
                    w.len(),
                    n
                )));
            }
            if w.iter().any(|&v| !(v >= F::zero()) || !v.is_finite()) {
                return Err(GlmPathError::InvalidValue(
                    "sample weights must be finite and non-negative".to_string(),
                ));
            }
            w.clone()
        }
        None => Array1::ones(n),
    };
    let total = weights.sum();
    if !(total > F::zero()) {
        return Err(GlmPathError::InvalidValue(
            "sample weights sum to zero".to_string(),
        ));
    }
    let weights_norm = &weights / total;

    if let Some(o) = offset {
        if o.len() != n {
            return Err(GlmPathError::DimensionMismatch(format!(
                "offset has {} elements but X has {} rows",
                o.len(),
                n
            )));
        }
        if o.iter().any(|v| !v.is_finite()) {
            return Err(GlmPathError::InvalidValue(
                "offset contains NaN or infinite values".to_string(),
            ));
        }
    }

    if config.l1_ratios.is_empty() {
        return Err(GlmPathError::EmptyInput("l1_ratios is empty".to_string()));
    }
    if let Some(bad) = config
        .l1_ratios
        .iter()
        .find(|&&r| !(r >= F::zero() && r <= F::one()))
    {
        return Err(GlmPathError::InvalidValue(format!(
            "l1_ratio must be in [0, 1], got {}",
            bad
        )));
    }
    match &config.alphas {
        Some(explicit) => {
            explicit_alpha_grid(explicit, 1)?;
        }
        None => {
            if config.n_alphas == 0 {
                return Err(GlmPathError::InvalidValue(
                    "n_alphas must be at least 1".to_string(),
                ));
            }
            if config.min_alpha.is_some() && config.min_alpha_ratio.is_some() {
                return Err(GlmPathError::InvalidValue(
                    "Only one of min_alpha and min_alpha_ratio may be set".to_string(),
                ));
            }
        }
    }
    if config.n_jobs == Some(0) {
        return Err(GlmPathError::InvalidValue("n_jobs must be at least 1".to_string()));
    }
    config.solver.validate()?;

    // family and link
    config.family.validate()?;
    let link_spec = config.link.resolve(config.family.default_link());
    if let FamilySpec::Tweedie { power } = config.family {
        if power > 1.0 && power < 2.0 && link_spec != LinkSpec::Log {
            return Err(GlmPathError::InvalidValue(format!(
                "Tweedie with power {} requires the log link",
                power
            )));
        }
    }
    let family = config.family.build::<F>()?;
    let link = link_spec.build::<F>()?;
    family.check_support(y)?;

    // penalties
    let p1 = resolve_p1(&config.p1, p)?;
    let p2 = resolve_p2(&config.p2, p)?;
    let psd = p2.is_positive_semidefinite();
    config.observer.on_penalty_check(&PenaltyCheck {
        stage: PenaltyCheckStage::BeforeStandardization,
        fold: None,
        l1_index: None,
        positive_semidefinite: psd,
    });
    if config.check_input {
        p2.validate()?;
    }

    let constraints = Constraints::new(
        p,
        config.lower_bounds.as_ref(),
        config.upper_bounds.as_ref(),
        config.a_ineq.as_ref(),
        config.b_ineq.as_ref(),
    )?;

    if let Some(clusters) = &config.clusters {
        if clusters.len() != n {
            return Err(GlmPathError::DimensionMismatch(format!(
                "clusters has {} elements but X has {} rows",
                clusters.len(),
                n
            )));
        }
    }

    if let Some(start) = &config.start_params {
        let expected = p + usize::from(config.fit_intercept);
        if start.len() != expected {
            return Err(GlmPathError::DimensionMismatch(format!(
                "start_params has {} elements, expected {}",
                start.len(),
                expected
            )));
        }
    }

    // folds
    let folds = splitter.split(n)?;
    if folds.is_empty() {
        return Err(GlmPathError::EmptyInput("the splitter produced no folds".to_string()));
    }
    for (i, fold) in folds.iter().enumerate() {
        validate_fold(i, fold, n)?;
        for (side, rows) in [("training", &fold.train), ("test", &fold.test)] {
            let mass: F = rows.iter().map(|&r| weights[r]).sum();
            if !(mass > F::zero()) {
                return Err(GlmPathError::InvalidValue(format!(
                    "fold {} has zero total {} weight",
                    i, side
                )));
            }
        }
    }

    Ok(Prepared {
        family,
        link,
        weights,
        weights_norm,
        p1,
        p2,
        constraints,
        folds,
    })
}

/// One generated grid per l1_ratio, from alpha_max on the full data.
fn generated_alpha_grids<F: GlmFloat, M: DesignMatrix<F>>(
    x: &M,
    y: &Array1<F>,
    prep: &Prepared<F>,
    offset: Option<&Array1<F>>,
    config: &GlmCvConfig<F>,
) -> Result<Array2<F>> {
    let st = standardize(
        x,
        &prep.weights_norm,
        config.fit_intercept && config.center_predictors,
        config.scale_predictors,
        &prep.p1,
        &prep.p2,
        &prep.constraints,
    );
    let problem = GlmProblem {
        x: &st.x,
        y,
        weights: &prep.weights_norm,
        offset,
        family: prep.family.as_ref(),
        link: prep.link.as_ref(),
        fit_intercept: config.fit_intercept,
        constraints: &st.constraints,
    };

    let mut grids = Array2::zeros((config.l1_ratios.len(), config.n_alphas));
    for (k, &l1) in config.l1_ratios.iter().enumerate() {
        let amax = alpha_max(&problem, &st.p1, l1, &config.solver)?;
        let grid = alpha_grid(amax, config.n_alphas, config.min_alpha_ratio, config.min_alpha)?;
        log::debug!("l1_ratio {}: alpha_max = {:.6e}", l1, amax.as_f64());
        grids.row_mut(k).assign(&grid);
    }
    Ok(grids)
}

/// Row-major position of the first minimum, ignoring NaN.
fn argmin_first<F: GlmFloat>(surface: &Array2<F>) -> Option<(usize, usize)> {
    let mut best: Option<((usize, usize), F)> = None;
    for (idx, &v) in surface.indexed_iter() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}
