// =============================================================================
// glmpath Python Bindings
// =============================================================================
//
// This module is the bridge between Rust and Python, built with PyO3. It wraps
// the pure Rust code from `glmpath-core` and is imported on the Python side as
// `glmpath._glmpath`.
//
// STRUCTURE:
// ----------
//   - families_py: family / link name parsing, the `Family` class, and the
//                  mapping from core errors to Python exceptions
//   - fitting_py:  `fit_glm_cv_py`, the cross-validated fit
//
// All numerics live in `glmpath-core`; nothing here does math.
// =============================================================================

use pyo3::prelude::*;

mod families_py;
mod fitting_py;

use families_py::PyFamily;
use fitting_py::fit_glm_cv_py;

/// glmpath: cross-validated elastic-net GLMs with a Rust backend.
///
/// This is the internal Rust module. Users should import from the Python
/// package: `import glmpath`
#[pymodule]
fn _glmpath(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFamily>()?;
    m.add_function(wrap_pyfunction!(fit_glm_cv_py, m)?)?;
    Ok(())
}
