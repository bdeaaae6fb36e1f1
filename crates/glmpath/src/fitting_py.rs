// =============================================================================
// Cross-Validated Fitting (Python Bindings)
// =============================================================================
//
// `fit_glm_cv_py` is the single fitting entry point exposed to Python. It
// accepts either a dense matrix or a sparse one in (row, col, value) triplet
// form, builds a `GlmCvConfig`, releases the GIL for the fit and returns a
// dict holding every reported quantity.
// =============================================================================

use std::sync::Arc;

use ndarray::{Array1, Array2};
use numpy::{IntoPyArray, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use glmpath_core::{
    fit_glm_cv_full, CscMatrix, CvSpec, ExplicitFolds, GlmCvConfig, GlmCvResult, KFold,
    LogObserver, P1Spec, P2Spec, Selection, SolverConfig, SolverKind,
};

use crate::families_py::{family_from_name, link_from_name, to_py_err};

type Triplets = (Vec<usize>, Vec<usize>, Vec<f64>);

/// Turn the result into a Python dict of numpy arrays and scalars.
fn result_to_py<'py>(py: Python<'py>, res: GlmCvResult<f64>) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new_bound(py);
    // a single l1_ratio reports a 1-D grid
    match res.alpha_grid() {
        Some(grid) => dict.set_item("alphas", grid.to_owned().into_pyarray_bound(py))?,
        None => dict.set_item("alphas", res.alphas.clone().into_pyarray_bound(py))?,
    }
    dict.set_item("alpha", res.alpha)?;
    dict.set_item("l1_ratio", res.l1_ratio)?;
    dict.set_item("l1_ratios", res.l1_ratios)?;
    dict.set_item("coef_path", res.coef_path.into_pyarray_bound(py))?;
    dict.set_item("intercept_path", res.intercept_path.into_pyarray_bound(py))?;
    dict.set_item("deviance_path", res.deviance_path.into_pyarray_bound(py))?;
    dict.set_item("n_iter_path", res.n_iter_path.into_pyarray_bound(py))?;
    dict.set_item("train_indices", res.train_indices)?;
    dict.set_item("avg_deviance", res.avg_deviance.into_pyarray_bound(py))?;
    dict.set_item("best_l1_idx", res.best_l1_idx)?;
    dict.set_item("best_alpha_idx", res.best_alpha_idx)?;
    dict.set_item("coef", res.coef.into_pyarray_bound(py))?;
    dict.set_item("intercept", res.intercept)?;
    dict.set_item("col_means", res.col_means.into_pyarray_bound(py))?;
    dict.set_item("col_stds", res.col_stds.into_pyarray_bound(py))?;
    dict.set_item("n_iter", res.n_iter)?;
    dict.set_item("converged", res.converged)?;
    match res.covariance_matrix {
        Some(cov) => dict.set_item("covariance_matrix", cov.into_pyarray_bound(py))?,
        None => dict.set_item("covariance_matrix", py.None())?,
    }
    Ok(dict)
}

/// Cross-validated elastic-net GLM.
///
/// Pass exactly one of `x` (dense, n × p) or `x_triplets` + `shape` (sparse).
/// `p2` may be 1-D (diagonal) or given as a full matrix via `p2_matrix`.
/// `folds` overrides `cv` with explicit (train, test) index pairs.
#[pyfunction]
#[pyo3(signature = (
    y, x=None, x_triplets=None, shape=None,
    family="gaussian", link=None, var_power=None, theta=None,
    l1_ratio=vec![0.0], alphas=None, n_alphas=100, min_alpha_ratio=None, min_alpha=None,
    p1=None, p2=None, p2_matrix=None,
    fit_intercept=true, center_predictors=true, scale_predictors=false,
    lower_bounds=None, upper_bounds=None, a_ineq=None, b_ineq=None,
    cv=5, shuffle=false, seed=None, folds=None, n_jobs=None,
    check_input=true, start_params=None, store_covariance_matrix=false, robust=false,
    clusters=None, expected_information=false,
    solver="auto", max_iter=100, max_inner_iter=100000, gradient_tol=Some(1e-4),
    step_size_tol=None, hessian_approx=0.0, selection="cyclic", random_state=None,
    weights=None, offset=None, verbose=false
))]
#[allow(clippy::too_many_arguments)]
pub fn fit_glm_cv_py<'py>(
    py: Python<'py>,
    y: PyReadonlyArray1<f64>,
    x: Option<PyReadonlyArray2<f64>>,
    x_triplets: Option<Triplets>,
    shape: Option<(usize, usize)>,
    family: &str,
    link: Option<&str>,
    var_power: Option<f64>,
    theta: Option<f64>,
    l1_ratio: Vec<f64>,
    alphas: Option<Vec<f64>>,
    n_alphas: usize,
    min_alpha_ratio: Option<f64>,
    min_alpha: Option<f64>,
    p1: Option<PyReadonlyArray1<f64>>,
    p2: Option<PyReadonlyArray1<f64>>,
    p2_matrix: Option<PyReadonlyArray2<f64>>,
    fit_intercept: bool,
    center_predictors: bool,
    scale_predictors: bool,
    lower_bounds: Option<PyReadonlyArray1<f64>>,
    upper_bounds: Option<PyReadonlyArray1<f64>>,
    a_ineq: Option<PyReadonlyArray2<f64>>,
    b_ineq: Option<PyReadonlyArray1<f64>>,
    cv: usize,
    shuffle: bool,
    seed: Option<u64>,
    folds: Option<Vec<(Vec<usize>, Vec<usize>)>>,
    n_jobs: Option<usize>,
    check_input: bool,
    start_params: Option<PyReadonlyArray1<f64>>,
    store_covariance_matrix: bool,
    robust: bool,
    clusters: Option<Vec<usize>>,
    expected_information: bool,
    solver: &str,
    max_iter: usize,
    max_inner_iter: usize,
    gradient_tol: Option<f64>,
    step_size_tol: Option<f64>,
    hessian_approx: f64,
    selection: &str,
    random_state: Option<u64>,
    weights: Option<PyReadonlyArray1<f64>>,
    offset: Option<PyReadonlyArray1<f64>>,
    verbose: bool,
) -> PyResult<Bound<'py, PyDict>> {
    // -------------------------------------------------------------------------
    // Convert inputs
    // -------------------------------------------------------------------------
    let owned1 = |a: Option<PyReadonlyArray1<f64>>| a.map(|v| v.as_array().to_owned());
    let owned2 = |a: Option<PyReadonlyArray2<f64>>| a.map(|v| v.as_array().to_owned());

    let y_array: Array1<f64> = y.as_array().to_owned();
    let weights_array = owned1(weights);
    let offset_array = owned1(offset);

    let p1_spec = match owned1(p1) {
        Some(w) => P1Spec::Weights(w),
        None => P1Spec::Identity,
    };
    let p2_spec = match (owned1(p2), owned2(p2_matrix)) {
        (Some(_), Some(_)) => {
            return Err(PyValueError::new_err("pass at most one of p2 and p2_matrix"))
        }
        (Some(d), None) => P2Spec::Diagonal(d),
        (None, Some(m)) => P2Spec::Matrix(m),
        (None, None) => P2Spec::Identity,
    };

    let cv_spec = match folds {
        Some(pairs) => CvSpec::Explicit(ExplicitFolds::new(pairs)),
        None => {
            let k = KFold::new(cv);
            CvSpec::KFold(if shuffle { k.with_shuffle(seed) } else { k })
        }
    };

    let solver_config = SolverConfig {
        solver: SolverKind::from_name(solver).map_err(to_py_err)?,
        max_iter,
        max_inner_iter,
        gradient_tol,
        step_size_tol,
        hessian_approx,
        selection: Selection::from_name(selection).map_err(to_py_err)?,
        random_state,
        ..SolverConfig::default()
    };

    let mut config = GlmCvConfig {
        family: family_from_name(family, var_power, theta)?,
        link: link_from_name(link)?,
        l1_ratios: l1_ratio,
        alphas,
        n_alphas,
        min_alpha_ratio,
        min_alpha,
        p1: p1_spec,
        p2: p2_spec,
        fit_intercept,
        center_predictors,
        scale_predictors,
        lower_bounds: owned1(lower_bounds),
        upper_bounds: owned1(upper_bounds),
        a_ineq: owned2(a_ineq),
        b_ineq: owned1(b_ineq),
        cv: cv_spec,
        n_jobs,
        check_input,
        start_params: owned1(start_params),
        store_covariance_matrix,
        robust,
        clusters,
        expected_information,
        solver: solver_config,
        ..GlmCvConfig::default()
    };
    if verbose {
        config.observer = Arc::new(LogObserver);
    }

    // -------------------------------------------------------------------------
    // Fit without holding the GIL
    // -------------------------------------------------------------------------
    let result = match (x, x_triplets) {
        (Some(dense), None) => {
            let x_array: Array2<f64> = dense.as_array().to_owned();
            py.allow_threads(|| {
                fit_glm_cv_full(
                    &x_array,
                    &y_array,
                    weights_array.as_ref(),
                    offset_array.as_ref(),
                    &config,
                )
            })
        }
        (None, Some((rows, cols, values))) => {
            let shape = shape.ok_or_else(|| {
                PyValueError::new_err("shape is required together with x_triplets")
            })?;
            let x_sparse =
                CscMatrix::from_triplets(shape, &rows, &cols, &values).map_err(to_py_err)?;
            py.allow_threads(|| {
                fit_glm_cv_full(
                    &x_sparse,
                    &y_array,
                    weights_array.as_ref(),
                    offset_array.as_ref(),
                    &config,
                )
            })
        }
        _ => {
            return Err(PyValueError::new_err(
                "pass exactly one of x and x_triplets",
            ))
        }
    }
    .map_err(to_py_err)?;

    result_to_py(py, result)
}
