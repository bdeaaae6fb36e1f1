// =============================================================================
// Floating-Point Precision
// =============================================================================
//
// A fit runs entirely in the precision of its design matrix: an f32 matrix
// gives an f32 fit, an f64 matrix an f64 fit. Coefficients, weights,
// penalties and every intermediate quantity share that one type.
//
// `GlmFloat` is the bound that makes this work. It is `num_traits::Float`
// plus the handful of dense factorizations the solvers need, implemented per
// concrete type on top of nalgebra (see `convert.rs`).
//
// =============================================================================

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use ndarray::{Array1, Array2, LinalgScalar, ScalarOperand};
use num_traits::{Float, FromPrimitive};

use crate::convert;

/// Scalar type a fit can run in (`f32` or `f64`).
pub trait GlmFloat:
    Float
    + FromPrimitive
    + LinalgScalar
    + ScalarOperand
    + Sum
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
    /// Convert an f64 constant into this precision.
    fn lit(x: f64) -> Self;

    /// Widen to f64 (for logging and observer events).
    fn as_f64(self) -> f64;

    /// Solve the symmetric positive-definite system `a x = b`.
    fn solve_spd(a: &Array2<Self>, b: &Array1<Self>) -> Option<Array1<Self>>;

    /// Invert a symmetric matrix.
    fn invert_symmetric(a: &Array2<Self>) -> Option<Array2<Self>>;

    /// Smallest eigenvalue of a symmetric matrix.
    fn min_eigenvalue(a: &Array2<Self>) -> Option<Self>;
}

macro_rules! impl_glm_float {
    ($t:ty) => {
        impl GlmFloat for $t {
            #[inline]
            fn lit(x: f64) -> Self {
                x as $t
            }

            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }

            fn solve_spd(a: &Array2<Self>, b: &Array1<Self>) -> Option<Array1<Self>> {
                convert::solve_symmetric(a, b)
            }

            fn invert_symmetric(a: &Array2<Self>) -> Option<Array2<Self>> {
                convert::invert_symmetric(a)
            }

            fn min_eigenvalue(a: &Array2<Self>) -> Option<Self> {
                convert::min_symmetric_eigenvalue(a)
            }
        }
    };
}

impl_glm_float!(f32);
impl_glm_float!(f64);

/// Largest linear predictor that can be exponentiated without overflow.
#[inline]
pub(crate) fn max_exp_arg<F: GlmFloat>() -> F {
    F::max_value().ln() - F::one()
}
