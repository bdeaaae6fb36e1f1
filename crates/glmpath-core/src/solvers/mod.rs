// =============================================================================
// Penalized GLM Solvers
// =============================================================================
//
// Fitting one penalty point means minimizing
//
//     ½ · deviance(β)  +  Σⱼ P1ⱼ |βⱼ|  +  ½ βᵀ P2 β
//
// over the standardized coefficients, subject to optional bounds and linear
// inequalities. The pieces:
//
//   - alpha_path:          alpha_max and the descending geometric grid
//   - irls:                outer Newton-type loop (reweight, inner solve,
//                          line search, convergence test)
//   - coordinate_descent:  inner solver for L1 penalties and constraints
//   - path:                warm-started sweep over one alpha grid
//
// When there is no L1 penalty and no constraint, the inner problem is a plain
// ridge-type least-squares system and is solved directly instead.
//
// =============================================================================

pub mod alpha_path;
mod coordinate_descent;
mod irls;
pub mod path;

pub use alpha_path::{alpha_grid, alpha_max, explicit_alpha_grid};
pub use irls::{
    solve_penalized, start_coefficients, GlmProblem, SolveResult, SolveStatus,
};
pub use path::{run_fold_path, solve_path, FoldJob, PathCoords, PathPoint, PathResult, PathSetup, SolvedPath};

use crate::error::{GlmPathError, Result};
use crate::float::GlmFloat;

// =============================================================================
// Configuration
// =============================================================================

/// Inner solver choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverKind {
    /// Direct least squares when possible, coordinate descent otherwise.
    #[default]
    Auto,
    /// IRLS with coordinate descent for the inner problem.
    IrlsCd,
    /// IRLS with a direct least-squares inner solve.
    IrlsLs,
}

impl SolverKind {
    /// Parse "auto", "irls-cd" or "irls-ls".
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "auto" => Ok(SolverKind::Auto),
            "irls-cd" | "irls_cd" => Ok(SolverKind::IrlsCd),
            "irls-ls" | "irls_ls" => Ok(SolverKind::IrlsLs),
            other => Err(GlmPathError::InvalidValue(format!(
                "Unknown solver '{}'. Use 'auto', 'irls-cd' or 'irls-ls'.",
                other
            ))),
        }
    }
}

/// Order in which coordinate descent visits the features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Cyclic,
    /// A fresh random permutation every sweep.
    Random,
}

impl Selection {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "cyclic" => Ok(Selection::Cyclic),
            "random" => Ok(Selection::Random),
            other => Err(GlmPathError::InvalidValue(format!(
                "selection must be 'cyclic' or 'random', got '{}'",
                other
            ))),
        }
    }
}

/// Configuration for one penalized IRLS solve.
///
/// The defaults suit most problems. Tighten `gradient_tol` for more precise
/// coefficients, or raise `max_iter` for slowly converging families.
#[derive(Debug, Clone)]
pub struct SolverConfig<F: GlmFloat> {
    pub solver: SolverKind,

    /// Maximum number of outer IRLS iterations.
    /// Default: 100
    pub max_iter: usize,

    /// Maximum number of coordinate-descent sweeps per inner solve.
    /// Default: 100000
    pub max_inner_iter: usize,

    /// Stop when the max-norm of the minimum-norm subgradient drops below this.
    /// Default: Some(1e-4)
    pub gradient_tol: Option<F>,

    /// Stop when the L2 norm of an accepted step drops below this.
    /// Default: None
    pub step_size_tol: Option<F>,

    /// Rows whose working weight is below `hessian_approx · max(w)` are left
    /// out of the Hessian.
    /// Default: 0.0 (exact Hessian)
    pub hessian_approx: F,

    pub selection: Selection,

    /// Seed for random coordinate selection. `None` draws from entropy.
    pub random_state: Option<u64>,

    /// Relative tolerance on A·w ≤ b violations.
    /// Default: 1e-8
    pub feasibility_tol: F,

    /// Augmented-Lagrangian rounds before declaring the inequalities infeasible.
    /// Default: 50
    pub max_constraint_iter: usize,
}

impl<F: GlmFloat> Default for SolverConfig<F> {
    fn default() -> Self {
        Self {
            solver: SolverKind::Auto,
            max_iter: 100,
            max_inner_iter: 100_000,
            gradient_tol: Some(F::lit(1e-4)),
            step_size_tol: None,
            hessian_approx: F::zero(),
            selection: Selection::Cyclic,
            random_state: None,
            feasibility_tol: F::lit(1e-8),
            max_constraint_iter: 50,
        }
    }
}

impl<F: GlmFloat> SolverConfig<F> {
    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_gradient_tol(mut self, tol: Option<F>) -> Self {
        self.gradient_tol = tol;
        self
    }

    pub fn with_step_size_tol(mut self, tol: Option<F>) -> Self {
        self.step_size_tol = tol;
        self
    }

    pub fn with_selection(mut self, selection: Selection, random_state: Option<u64>) -> Self {
        self.selection = selection;
        self.random_state = random_state;
        self
    }

    pub fn with_hessian_approx(mut self, hessian_approx: F) -> Self {
        self.hessian_approx = hessian_approx;
        self
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(GlmPathError::InvalidValue(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if self.max_inner_iter == 0 {
            return Err(GlmPathError::InvalidValue(
                "max_inner_iter must be at least 1".to_string(),
            ));
        }
        for (name, tol) in [("gradient_tol", self.gradient_tol), ("step_size_tol", self.step_size_tol)] {
            if let Some(t) = tol {
                if !(t > F::zero()) {
                    return Err(GlmPathError::InvalidValue(format!(
                        "{} must be positive, got {}",
                        name, t
                    )));
                }
            }
        }
        if !(self.hessian_approx >= F::zero() && self.hessian_approx < F::one()) {
            return Err(GlmPathError::InvalidValue(format!(
                "hessian_approx must be in [0, 1), got {}",
                self.hessian_approx
            )));
        }
        if !(self.feasibility_tol > F::zero()) {
            return Err(GlmPathError::InvalidValue(
                "feasibility_tol must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Pick the inner solver for one penalty / constraint combination.
    ///
    /// Constraints always force coordinate descent. An explicit least-squares
    /// request with an active L1 penalty is an error.
    pub fn resolve_kind(&self, has_l1: bool, constrained: bool) -> Result<SolverKind> {
        match self.solver {
            SolverKind::Auto => Ok(if has_l1 || constrained {
                SolverKind::IrlsCd
            } else {
                SolverKind::IrlsLs
            }),
            SolverKind::IrlsCd => Ok(SolverKind::IrlsCd),
            SolverKind::IrlsLs if has_l1 => Err(GlmPathError::InvalidValue(
                "The 'irls-ls' solver cannot handle L1 penalties; use 'irls-cd' or 'auto'"
                    .to_string(),
            )),
            SolverKind::IrlsLs if constrained => {
                log::warn!("bounds or inequality constraints present; switching to 'irls-cd'");
                Ok(SolverKind::IrlsCd)
            }
            SolverKind::IrlsLs => Ok(SolverKind::IrlsLs),
        }
    }
}
