// End-to-end cross-validation scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use glmpath_core::{
    fit_glm_cv, fit_glm_cv_full, CscMatrix, CvSpec, ExplicitFolds, FamilySpec, FitObserver,
    GlmCvConfig, GlmPathError, IterationEvent, KFold, P1Spec, P2Spec, PathPointEvent,
    PenaltyCheck, PenaltyCheckStage, Selection, SolverConfig,
};
use ndarray::{array, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn synthetic(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n, 5), |_| rng.gen_range(-1.0..1.0));
    let beta = array![1.5, -2.0, 0.0, 0.5, 0.0];
    let noise = Array1::from_shape_fn(n, |_| rng.gen_range(-0.5..0.5));
    let y = x.dot(&beta) + noise + 0.3;
    (x, y)
}

fn l1_norms(path: ndarray::ArrayView2<f64>) -> Vec<f64> {
    path.rows()
        .into_iter()
        .map(|r| r.iter().map(|v| v.abs()).sum())
        .collect()
}

#[derive(Default)]
struct CountingObserver {
    iterations: AtomicUsize,
    path_points: AtomicUsize,
    checks_before: AtomicUsize,
    checks_after: AtomicUsize,
}

impl FitObserver for CountingObserver {
    fn on_iteration(&self, _event: &IterationEvent) {
        self.iterations.fetch_add(1, Ordering::SeqCst);
    }

    fn on_path_point(&self, _event: &PathPointEvent) {
        self.path_points.fetch_add(1, Ordering::SeqCst);
    }

    fn on_penalty_check(&self, check: &PenaltyCheck) {
        match check.stage {
            PenaltyCheckStage::BeforeStandardization => &self.checks_before,
            PenaltyCheckStage::AfterStandardization => &self.checks_after,
        }
        .fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_gaussian_grid_shapes_and_selection() {
    let (x, y) = synthetic(100, 1);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.0, 0.5, 1.0])
        .with_n_alphas(10)
        .with_cv(CvSpec::KFold(KFold::new(5)));
    let res = fit_glm_cv(&x, &y, &config).unwrap();

    assert_eq!(res.alphas.shape(), &[3, 10]);
    assert!(res.alpha_grid().is_none());
    for row in res.alphas.rows() {
        for w in row.to_vec().windows(2) {
            assert!(w[0] > w[1]);
        }
    }
    assert_eq!(res.deviance_path.shape(), &[5, 3, 10]);
    assert_eq!(res.coef_path.shape(), &[5, 3, 10, 5]);
    assert_eq!(res.intercept_path.shape(), &[5, 3, 10]);
    assert!(res.deviance_path.iter().all(|d| d.is_finite() && *d >= 0.0));
    assert_eq!(res.train_indices.len(), 15);

    let avg = res.deviance_path.mean_axis(Axis(0)).unwrap();
    let mut best = (0, 0);
    for ((l, a), &v) in avg.indexed_iter() {
        if v < avg[best] {
            best = (l, a);
        }
    }
    assert_eq!((res.best_l1_idx, res.best_alpha_idx), best);
    assert_eq!(res.alpha, res.alphas[best]);
    assert_eq!(res.l1_ratio, [0.0, 0.5, 1.0][best.0]);
    assert_eq!(res.coef.len(), 5);
    // the signal is strong, the weakest penalty should recover it
    assert!(res.coef[1] < -1.0);
}

#[test]
fn test_explicit_alphas_are_kept_verbatim() {
    let (x, y) = synthetic(60, 2);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.3])
        .with_alphas(vec![0.01, 1.0, 0.1])
        .with_cv(CvSpec::KFold(KFold::new(3)));
    let res = fit_glm_cv(&x, &y, &config).unwrap();
    assert_eq!(res.alphas.shape(), &[1, 3]);
    assert_eq!(res.alphas.row(0).to_vec(), vec![1.0, 0.1, 0.01]);
    assert_eq!(res.alpha_grid().unwrap().to_vec(), vec![1.0, 0.1, 0.01]);
}

#[test]
fn test_indefinite_p2_rejected_before_solving() {
    let (x, y) = synthetic(40, 3);
    let mut p2 = Array2::eye(5);
    p2[[0, 1]] = 2.0;
    p2[[1, 0]] = 2.0;
    let observer = Arc::new(CountingObserver::default());
    let config = GlmCvConfig::default()
        .with_penalties(P1Spec::Identity, P2Spec::Matrix(p2))
        .with_observer(observer.clone());
    let err = fit_glm_cv(&x, &y, &config).unwrap_err();
    assert!(matches!(err, GlmPathError::InvalidValue(_)));
    assert!(err.is_configuration());
    assert_eq!(observer.iterations.load(Ordering::SeqCst), 0);
    assert_eq!(observer.checks_before.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fit_is_deterministic_with_fixed_seeds() {
    let (x, y) = synthetic(80, 4);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.5, 1.0])
        .with_n_alphas(8)
        .with_cv(CvSpec::KFold(KFold::new(4).with_shuffle(Some(3))))
        .with_solver(SolverConfig::default().with_selection(Selection::Random, Some(11)));
    let a = fit_glm_cv(&x, &y, &config).unwrap();
    let b = fit_glm_cv(&x, &y, &config).unwrap();
    assert_eq!(a.alpha, b.alpha);
    assert_eq!(a.l1_ratio, b.l1_ratio);
    assert_eq!(a.coef, b.coef);
    assert_eq!(a.deviance_path, b.deviance_path);
}

#[test]
fn test_alpha_max_zeroes_the_lasso_refit() {
    let (x, y) = synthetic(60, 5);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![1.0])
        .with_n_alphas(5)
        .with_cv(CvSpec::KFold(KFold::new(3)));
    let res = fit_glm_cv(&x, &y, &config).unwrap();
    let amax = res.alphas[[0, 0]];

    let at_max = config.clone().with_alphas(vec![amax * 1.0001]);
    let refit = fit_glm_cv(&x, &y, &at_max).unwrap();
    assert!(refit.coef.iter().all(|c| c.abs() < 1e-10));
    assert_relative_eq!(refit.intercept, y.mean().unwrap(), max_relative = 1e-8);

    // just below alpha_max something enters the model
    let below = config.with_alphas(vec![amax * 0.9]);
    let refit = fit_glm_cv(&x, &y, &below).unwrap();
    assert!(refit.coef.iter().any(|c| c.abs() > 1e-8));
}

#[test]
fn test_deviance_invariant_to_weight_rescaling() {
    let (x, y) = synthetic(50, 6);
    let mut rng = StdRng::seed_from_u64(60);
    let w = Array1::from_shape_fn(50, |_| rng.gen_range(0.5..2.0));
    let w_scaled = &w * 7.0;
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.5])
        .with_n_alphas(6)
        .with_cv(CvSpec::KFold(KFold::new(5)));
    let a = fit_glm_cv_full(&x, &y, Some(&w), None, &config).unwrap();
    let b = fit_glm_cv_full(&x, &y, Some(&w_scaled), None, &config).unwrap();
    for (da, db) in a.deviance_path.iter().zip(b.deviance_path.iter()) {
        assert_relative_eq!(*da, *db, max_relative = 1e-6);
    }
    assert_eq!(a.best_alpha_idx, b.best_alpha_idx);
}

#[test]
fn test_l1_norm_grows_as_alpha_shrinks() {
    let (x, y) = synthetic(80, 7);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![1.0])
        .with_n_alphas(15)
        .with_cv(CvSpec::KFold(KFold::new(4)))
        .with_solver(SolverConfig::default().with_gradient_tol(Some(1e-9)));
    let res = fit_glm_cv(&x, &y, &config).unwrap();
    for fold in 0..4 {
        let path = res.coef_path.index_axis(Axis(0), fold);
        let norms = l1_norms(path.index_axis(Axis(0), 0));
        for w in norms.windows(2) {
            assert!(w[0] <= w[1] + 1e-6, "L1 norm decreased: {:?}", norms);
        }
    }
}

#[test]
fn test_sparse_matches_dense() {
    let (mut x, y) = synthetic(60, 8);
    // make the matrix actually sparse
    x.mapv_inplace(|v| if v.abs() < 0.4 { 0.0 } else { v });
    let sparse = CscMatrix::from_dense(&x);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.5])
        .with_n_alphas(6)
        .with_cv(CvSpec::KFold(KFold::new(3)))
        .with_solver(SolverConfig::default().with_gradient_tol(Some(1e-8)));
    let dense_res = fit_glm_cv(&x, &y, &config).unwrap();
    let sparse_res = fit_glm_cv(&sparse, &y, &config).unwrap();
    assert_eq!(dense_res.best_alpha_idx, sparse_res.best_alpha_idx);
    for (a, b) in dense_res.coef.iter().zip(sparse_res.coef.iter()) {
        assert!((a - b).abs() < 1e-5);
    }
    for (a, b) in dense_res
        .deviance_path
        .iter()
        .zip(sparse_res.deviance_path.iter())
    {
        assert_relative_eq!(*a, *b, max_relative = 1e-5);
    }
}

#[test]
fn test_contradictory_bounds_are_infeasible() {
    let (x, y) = synthetic(30, 9);
    let config = GlmCvConfig::default().with_bounds(
        Some(Array1::from_elem(5, 1.0)),
        Some(Array1::from_elem(5, 0.0)),
    );
    let err = fit_glm_cv(&x, &y, &config).unwrap_err();
    assert!(matches!(err, GlmPathError::ConstraintInfeasible(_)));
}

#[test]
fn test_bounds_and_inequalities_hold_along_every_path() {
    let (x, y) = synthetic(60, 10);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.5])
        .with_n_alphas(5)
        .with_cv(CvSpec::KFold(KFold::new(3)))
        .with_bounds(Some(Array1::zeros(5)), None)
        .with_inequalities(array![[1.0, 0.0, 0.0, 1.0, 0.0]], array![1.0]);
    let res = fit_glm_cv(&x, &y, &config).unwrap();
    assert!(res.coef_path.iter().all(|&c| c >= -1e-10));
    for lane in res.coef_path.lanes(Axis(3)) {
        assert!(lane[0] + lane[3] <= 1.0 + 1e-6);
    }
    assert!(res.coef.iter().all(|&c| c >= -1e-10));
    assert!(res.coef[0] + res.coef[3] <= 1.0 + 1e-6);
    // the negative signal is bounded away
    assert!(res.coef[1].abs() < 1e-10);
}

#[test]
fn test_explicit_folds_and_single_precision() {
    let (x, y) = synthetic(20, 11);
    let xf = x.mapv(|v| v as f32);
    let yf = y.mapv(|v| v as f32);
    let first: Vec<usize> = (0..10).collect();
    let second: Vec<usize> = (10..20).collect();
    let folds = ExplicitFolds::new(vec![
        (first.clone(), second.clone()),
        (second, first),
    ]);
    let config = GlmCvConfig::<f32>::default()
        .with_l1_ratios(vec![0.5])
        .with_n_alphas(4)
        .with_cv(CvSpec::Explicit(folds));
    let res = fit_glm_cv(&xf, &yf, &config).unwrap();
    assert_eq!(res.deviance_path.shape(), &[2, 1, 4]);
    assert!(res.coef.iter().all(|c| c.is_finite()));
    assert!(res.intercept.is_finite());
}

#[test]
fn test_observer_sees_every_path_point() {
    let (x, y) = synthetic(40, 12);
    let observer = Arc::new(CountingObserver::default());
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.0, 1.0])
        .with_n_alphas(3)
        .with_cv(CvSpec::KFold(KFold::new(4)))
        .with_observer(observer.clone());
    fit_glm_cv(&x, &y, &config).unwrap();
    // 4 folds x 2 ratios x 3 alphas, plus the final refit
    assert_eq!(observer.path_points.load(Ordering::SeqCst), 25);
    assert_eq!(observer.checks_before.load(Ordering::SeqCst), 1);
    assert_eq!(observer.checks_after.load(Ordering::SeqCst), 9);
    assert!(observer.iterations.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_poisson_with_offset_and_covariance() {
    let (x, _) = synthetic(120, 13);
    let mut rng = StdRng::seed_from_u64(130);
    let exposure = Array1::from_shape_fn(120, |_| rng.gen_range(0.5..2.0));
    let offset = exposure.mapv(f64::ln);
    let eta = x.dot(&array![0.4, -0.3, 0.0, 0.2, 0.0]) + &offset;
    let y = eta.mapv(|e| (e.exp() * rng.gen_range(0.0..2.0)).floor());
    let config = GlmCvConfig {
        family: FamilySpec::Poisson,
        store_covariance_matrix: true,
        n_jobs: Some(2),
        ..GlmCvConfig::default()
    }
    .with_l1_ratios(vec![0.5])
    .with_n_alphas(5)
    .with_cv(CvSpec::KFold(KFold::new(3)));
    let res = fit_glm_cv_full(&x, &y, None, Some(&offset), &config).unwrap();
    assert!(res.deviance_path.iter().all(|d| d.is_finite()));
    let cov = res.covariance_matrix.unwrap();
    assert_eq!(cov.shape(), &[6, 6]);
    for i in 0..6 {
        assert!(cov[[i, i]] > 0.0);
    }
}

#[test]
fn test_poisson_rejects_negative_response() {
    let (x, mut y) = synthetic(30, 14);
    y.mapv_inplace(f64::abs);
    y[4] = -1.0;
    let config = GlmCvConfig::default().with_family(FamilySpec::Poisson);
    let err = fit_glm_cv(&x, &y, &config).unwrap_err();
    assert!(matches!(err, GlmPathError::Domain { .. }));
}

#[test]
fn test_non_finite_x_or_offset_rejected_before_solving() {
    let (mut x, y) = synthetic(40, 15);
    let observer = Arc::new(CountingObserver::default());
    let config = GlmCvConfig::default()
        .with_cv(CvSpec::KFold(KFold::new(3)))
        .with_observer(observer.clone());

    let mut offset = Array1::zeros(40);
    offset[3] = f64::NAN;
    let err = fit_glm_cv_full(&x, &y, None, Some(&offset), &config).unwrap_err();
    assert!(matches!(err, GlmPathError::InvalidValue(_)));

    x[[5, 2]] = f64::NAN;
    let err = fit_glm_cv(&x, &y, &config).unwrap_err();
    assert!(matches!(err, GlmPathError::InvalidValue(_)));
    let err = fit_glm_cv(&CscMatrix::from_dense(&x), &y, &config).unwrap_err();
    assert!(matches!(err, GlmPathError::InvalidValue(_)));

    assert_eq!(observer.iterations.load(Ordering::SeqCst), 0);
    assert_eq!(observer.path_points.load(Ordering::SeqCst), 0);
}

#[test]
fn test_centering_does_not_change_the_estimate() {
    let (x, y) = synthetic(60, 16);
    let centered = GlmCvConfig::default()
        .with_l1_ratios(vec![0.5])
        .with_alphas(vec![0.1, 0.01])
        .with_cv(CvSpec::KFold(KFold::new(3)))
        .with_solver(SolverConfig::default().with_gradient_tol(Some(1e-8)));
    let uncentered = GlmCvConfig {
        center_predictors: false,
        ..centered.clone()
    };
    let a = fit_glm_cv(&x, &y, &centered).unwrap();
    let b = fit_glm_cv(&x, &y, &uncentered).unwrap();
    assert_eq!(a.best_alpha_idx, b.best_alpha_idx);
    assert!(b.col_means.iter().all(|&m| m == 0.0));
    for (ca, cb) in a.coef_path.iter().zip(b.coef_path.iter()) {
        assert_abs_diff_eq!(*ca, *cb, epsilon = 1e-5);
    }
    for (ia, ib) in a.intercept_path.iter().zip(b.intercept_path.iter()) {
        assert_abs_diff_eq!(*ia, *ib, epsilon = 1e-5);
    }
    assert_abs_diff_eq!(a.intercept, b.intercept, epsilon = 1e-5);
}

#[test]
fn test_scaled_penalty_is_invariant_to_column_units() {
    let (x, y) = synthetic(60, 17);
    let mut x_units = x.clone();
    x_units.column_mut(0).mapv_inplace(|v| v * 100.0);
    let config = GlmCvConfig {
        scale_predictors: true,
        ..GlmCvConfig::default()
    }
    .with_l1_ratios(vec![0.5])
    .with_alphas(vec![0.05])
    .with_cv(CvSpec::KFold(KFold::new(3)));
    let a = fit_glm_cv(&x, &y, &config).unwrap();
    let b = fit_glm_cv(&x_units, &y, &config).unwrap();
    assert_relative_eq!(b.coef[0] * 100.0, a.coef[0], max_relative = 1e-8);
    for j in 1..5 {
        assert_relative_eq!(b.coef[j], a.coef[j], max_relative = 1e-8, epsilon = 1e-12);
    }
    assert_relative_eq!(b.col_stds[0], a.col_stds[0] * 100.0, max_relative = 1e-10);
}

#[test]
fn test_hessian_approximation_reaches_the_same_fit() {
    let (x, _) = synthetic(120, 18);
    let mut rng = StdRng::seed_from_u64(180);
    let eta = x.dot(&array![0.8, -0.6, 0.0, 0.4, 0.0]);
    let y = eta.mapv(|e| (e.exp() * rng.gen_range(0.0..2.0)).floor());
    let solver = SolverConfig::default()
        .with_gradient_tol(Some(1e-6))
        .with_max_iter(500);
    let exact = GlmCvConfig::default()
        .with_family(FamilySpec::Poisson)
        .with_l1_ratios(vec![0.5])
        .with_alphas(vec![0.01])
        .with_cv(CvSpec::KFold(KFold::new(3)))
        .with_solver(solver.clone());
    let truncated = exact
        .clone()
        .with_solver(solver.with_hessian_approx(0.5));
    let a = fit_glm_cv(&x, &y, &exact).unwrap();
    let b = fit_glm_cv(&x, &y, &truncated).unwrap();
    assert!(a.converged && b.converged);
    for (ca, cb) in a.coef.iter().zip(b.coef.iter()) {
        assert_abs_diff_eq!(*ca, *cb, epsilon = 1e-4);
    }
    assert_abs_diff_eq!(a.intercept, b.intercept, epsilon = 1e-4);
}

#[test]
fn test_start_params_at_the_solution_need_no_iterations() {
    let (x, y) = synthetic(60, 19);
    let config = GlmCvConfig::default()
        .with_l1_ratios(vec![0.5])
        .with_alphas(vec![0.05])
        .with_cv(CvSpec::KFold(KFold::new(3)));
    let first = fit_glm_cv(&x, &y, &config).unwrap();

    let mut start = vec![first.intercept];
    start.extend(first.coef.iter().copied());
    let warm = GlmCvConfig {
        start_params: Some(Array1::from_vec(start)),
        ..config.clone()
    };
    let second = fit_glm_cv(&x, &y, &warm).unwrap();
    assert_eq!(second.n_iter, 0);
    assert!(second.converged);
    for (a, b) in first.coef.iter().zip(second.coef.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
    }

    let wrong = GlmCvConfig {
        start_params: Some(Array1::zeros(5)),
        ..config
    };
    let err = fit_glm_cv(&x, &y, &wrong).unwrap_err();
    assert!(matches!(err, GlmPathError::DimensionMismatch(_)));
}

#[test]
fn test_min_alpha_ends_the_generated_grid() {
    let (x, y) = synthetic(60, 20);
    let config = GlmCvConfig {
        min_alpha: Some(1e-3),
        ..GlmCvConfig::default()
    }
    .with_l1_ratios(vec![1.0])
    .with_n_alphas(7)
    .with_cv(CvSpec::KFold(KFold::new(3)));
    let res = fit_glm_cv(&x, &y, &config).unwrap();
    assert_eq!(res.alphas.shape(), &[1, 7]);
    assert_relative_eq!(res.alphas[[0, 6]], 1e-3, max_relative = 1e-10);
    assert!(res.alphas[[0, 0]] > 1e-3);

    let both = GlmCvConfig {
        min_alpha_ratio: Some(1e-2),
        ..config
    };
    let err = fit_glm_cv(&x, &y, &both).unwrap_err();
    assert!(matches!(err, GlmPathError::InvalidValue(_)));
}

#[test]
fn test_fit_without_intercept() {
    let (x, y) = synthetic(60, 21);
    let config = GlmCvConfig {
        fit_intercept: false,
        ..GlmCvConfig::default()
    }
    .with_l1_ratios(vec![0.5])
    .with_n_alphas(5)
    .with_cv(CvSpec::KFold(KFold::new(3)));
    let res = fit_glm_cv(&x, &y, &config).unwrap();
    assert_eq!(res.intercept, 0.0);
    assert!(res.intercept_path.iter().all(|&b| b == 0.0));
    assert!(res.col_means.iter().all(|&m| m == 0.0));
    assert_eq!(res.coef.len(), 5);
    assert!(res.coef[1] < -1.0);
}

#[test]
fn test_clustered_covariance_of_the_final_fit() {
    let (x, y) = synthetic(60, 22);
    let base = GlmCvConfig::default()
        .with_l1_ratios(vec![0.5])
        .with_alphas(vec![0.01])
        .with_cv(CvSpec::KFold(KFold::new(3)));

    let singletons: Vec<usize> = (0..60).collect();
    let robust = fit_glm_cv(&x, &y, &base.clone().with_covariance(true, None)).unwrap();
    let clustered = fit_glm_cv(&x, &y, &base.clone().with_covariance(false, Some(singletons)))
        .unwrap();
    let (a, b) = (
        robust.covariance_matrix.unwrap(),
        clustered.covariance_matrix.unwrap(),
    );
    assert_eq!(b.shape(), &[6, 6]);
    for (u, v) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*u, *v, max_relative = 1e-10, epsilon = 1e-14);
    }

    let groups: Vec<usize> = (0..60).map(|i| i % 6).collect();
    let grouped = fit_glm_cv(&x, &y, &base.clone().with_covariance(false, Some(groups))).unwrap();
    let cov = grouped.covariance_matrix.unwrap();
    for i in 0..6 {
        assert!(cov[[i, i]] >= 0.0);
    }

    let short = base.with_covariance(false, Some(vec![0; 10]));
    let err = fit_glm_cv(&x, &y, &short).unwrap_err();
    assert!(matches!(err, GlmPathError::DimensionMismatch(_)));
}

#[test]
fn test_start_params_outside_bounds_are_clipped() {
    let (x, y) = synthetic(60, 23);
    let config = GlmCvConfig {
        start_params: Some(array![0.0, -5.0, -5.0, 3.0, -5.0, 2.0]),
        ..GlmCvConfig::default()
    }
    .with_l1_ratios(vec![0.5])
    .with_n_alphas(4)
    .with_cv(CvSpec::KFold(KFold::new(3)))
    .with_bounds(Some(Array1::zeros(5)), Some(Array1::from_elem(5, 2.5)));
    let res = fit_glm_cv(&x, &y, &config).unwrap();
    assert!(res.coef_path.iter().all(|&c| (-1e-10..=2.5 + 1e-10).contains(&c)));
    assert!(res.coef.iter().all(|&c| (-1e-10..=2.5 + 1e-10).contains(&c)));
}
