// =============================================================================
// Family and Link Python Helpers
// =============================================================================
//
// Python passes families and links by name. These helpers turn the names into
// the core library's closed `FamilySpec` / `LinkSpec` sets, and expose a
// small `Family` class so Python code can evaluate deviances with exactly the
// formulas the solver uses.
// =============================================================================

use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use glmpath_core::families::Family;
use glmpath_core::{FamilySpec, GlmPathError, LinkSpec};

/// Map a core error to a Python exception.
///
/// Configuration problems become `ValueError`; failures found while solving
/// (infeasible constraints, singular systems) become `RuntimeError`.
pub(crate) fn to_py_err(err: GlmPathError) -> PyErr {
    if err.is_configuration() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

/// Resolve a family name.
///
/// `var_power` overrides the Tweedie power and `theta` the negative binomial
/// theta unless the name already carries one, e.g. "tweedie (1.2)".
pub(crate) fn family_from_name(
    name: &str,
    var_power: Option<f64>,
    theta: Option<f64>,
) -> PyResult<FamilySpec> {
    let has_param = name.contains('(');
    let parsed = FamilySpec::from_name(name).map_err(to_py_err)?;
    let spec = match (parsed, var_power, theta) {
        (FamilySpec::Tweedie { .. }, Some(power), _) if !has_param => FamilySpec::Tweedie { power },
        (FamilySpec::NegativeBinomial { .. }, _, Some(theta)) if !has_param => {
            FamilySpec::NegativeBinomial { theta }
        }
        (other, _, _) => other,
    };
    spec.validate().map_err(to_py_err)?;
    Ok(spec)
}

/// Resolve an optional link name; `None` means the family default.
pub(crate) fn link_from_name(name: Option<&str>) -> PyResult<LinkSpec> {
    match name {
        Some(n) => LinkSpec::from_name(n).map_err(to_py_err),
        None => Ok(LinkSpec::Auto),
    }
}

/// A distribution family, for evaluating deviances from Python.
#[pyclass(name = "Family")]
pub struct PyFamily {
    spec: FamilySpec,
    inner: Box<dyn Family<f64>>,
}

#[pymethods]
impl PyFamily {
    #[new]
    #[pyo3(signature = (name, var_power=None, theta=None))]
    fn new(name: &str, var_power: Option<f64>, theta: Option<f64>) -> PyResult<Self> {
        let spec = family_from_name(name, var_power, theta)?;
        let inner = spec.build::<f64>().map_err(to_py_err)?;
        Ok(Self { spec, inner })
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Name of the link used when none is given.
    fn default_link(&self) -> &'static str {
        match self.spec.default_link() {
            LinkSpec::Identity => "identity",
            LinkSpec::Logit => "logit",
            LinkSpec::Cloglog => "cloglog",
            LinkSpec::Log | LinkSpec::Auto => "log",
        }
    }

    fn variance<'py>(&self, py: Python<'py>, mu: PyReadonlyArray1<f64>) -> Bound<'py, PyArray1<f64>> {
        self.inner
            .variance(&mu.as_array().to_owned())
            .into_pyarray_bound(py)
    }

    fn unit_deviance<'py>(
        &self,
        py: Python<'py>,
        y: PyReadonlyArray1<f64>,
        mu: PyReadonlyArray1<f64>,
    ) -> Bound<'py, PyArray1<f64>> {
        self.inner
            .unit_deviance(&y.as_array().to_owned(), &mu.as_array().to_owned())
            .into_pyarray_bound(py)
    }

    #[pyo3(signature = (y, mu, weights=None))]
    fn deviance(
        &self,
        y: PyReadonlyArray1<f64>,
        mu: PyReadonlyArray1<f64>,
        weights: Option<PyReadonlyArray1<f64>>,
    ) -> PyResult<f64> {
        let y = y.as_array().to_owned();
        let mu = mu.as_array().to_owned();
        if y.len() != mu.len() {
            return Err(PyValueError::new_err(format!(
                "y has {} elements but mu has {}",
                y.len(),
                mu.len()
            )));
        }
        let w = weights.map(|w| w.as_array().to_owned());
        if let Some(w) = &w {
            if w.len() != y.len() {
                return Err(PyValueError::new_err(format!(
                    "weights has {} elements but y has {}",
                    w.len(),
                    y.len()
                )));
            }
        }
        Ok(self.inner.deviance(&y, &mu, w.as_ref()))
    }

    fn __repr__(&self) -> String {
        format!("Family({:?})", self.spec)
    }
}
