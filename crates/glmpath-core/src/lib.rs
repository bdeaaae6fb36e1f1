// =============================================================================
// glmpath Core Library
// =============================================================================
//
// Pure Rust implementation of cross-validated elastic-net GLMs. No Python
// code is involved here; the `glmpath` crate wraps this library for Python.
//
// STRUCTURE:
// ----------
//   - families:       distribution families (Gaussian, Poisson, Tweedie, ...)
//   - links:          link functions (identity, log, logit, cloglog)
//   - matrix:         DesignMatrix trait for dense and sparse X
//   - regularization: P1 / P2 penalty specifications
//   - constraints:    coefficient bounds and linear inequalities
//   - standardize:    column scaling and its inverse
//   - solvers:        alpha grid, penalized IRLS, path runner
//   - cv:             fold splitting and the cross-validation orchestrator
//   - inference:      covariance matrix of the final fit
//   - diagnostics:    FitObserver hook for structured progress events
//   - error:          error type used throughout the library
//
// A typical call:
//
//     let config = GlmCvConfig::default()
//         .with_family(FamilySpec::Poisson)
//         .with_l1_ratios(vec![0.0, 0.5, 1.0]);
//     let result = fit_glm_cv(&x, &y, &config)?;
//
// =============================================================================

pub mod constraints;
pub mod convert;
pub mod cv;
pub mod diagnostics;
pub mod error;
pub mod families;
pub mod float;
pub mod inference;
pub mod links;
pub mod matrix;
pub mod regularization;
pub mod solvers;
pub mod standardize;

// Re-export the pieces most callers need
pub use constraints::{Constraints, LinearInequalities};
pub use cv::{
    fit_glm_cv, fit_glm_cv_full, fit_glm_cv_with_splitter, CvSpec, ExplicitFolds, Fold,
    FoldSplitter, GlmCvConfig, GlmCvResult, KFold,
};
pub use diagnostics::{
    FitObserver, IterationEvent, LogObserver, NoopObserver, PathPointEvent, PenaltyCheck,
    PenaltyCheckStage,
};
pub use error::{GlmPathError, Result};
pub use families::{Family, FamilySpec};
pub use float::GlmFloat;
pub use inference::{covariance_matrix, CovarianceOptions};
pub use links::{Link, LinkSpec};
pub use matrix::{CscMatrix, DesignMatrix};
pub use regularization::{P1Spec, P2Spec};
pub use solvers::{Selection, SolverConfig, SolverKind};
pub use standardize::ColumnScaling;
