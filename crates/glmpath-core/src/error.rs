// =============================================================================
// Error Types
// =============================================================================
//
// Every fallible operation in the library returns `Result<T>`, which is an
// alias for `std::result::Result<T, GlmPathError>`.
//
// ERROR TAXONOMY:
// ---------------
//   - Configuration mistakes (bad l1_ratio, negative alphas, non-PSD P2,
//     zero-weight folds) are `InvalidValue` and are raised before any
//     fitting work starts.
//   - A response outside the family's support is a `Domain` error.
//   - Infeasible bounds / inequality systems are `ConstraintInfeasible`.
//     They abort the whole cross-validation call.
//   - Hitting the iteration budget is NOT an error. It shows up as
//     `converged == false` on the result.
//
// =============================================================================

use thiserror::Error;

/// All the ways a fit can fail.
#[derive(Debug, Error)]
pub enum GlmPathError {
    /// Array shapes disagree (e.g. X has 10 rows, y has 9 elements).
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Something that must be non-empty was empty.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A configuration or input value is out of its valid range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The response lies outside the support of the chosen family.
    #[error("Response outside the support of the {family} family: {detail}")]
    Domain { family: String, detail: String },

    /// No coefficient vector satisfies the bounds / inequality constraints.
    #[error("Constraints are infeasible: {0}")]
    ConstraintInfeasible(String),

    /// A dense factorization failed (singular normal equations).
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// The worker pool for cross-validation jobs could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl GlmPathError {
    /// True for errors caused by the caller's configuration or inputs,
    /// as opposed to failures discovered while solving.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GlmPathError::DimensionMismatch(_)
                | GlmPathError::EmptyInput(_)
                | GlmPathError::InvalidValue(_)
                | GlmPathError::Domain { .. }
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GlmPathError>;
