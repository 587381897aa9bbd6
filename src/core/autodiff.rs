//! Forward-mode automatic differentiation for pose cost functors.
//!
//! Cost functors are written once, generically over [`AutoDiffScalar`], and evaluated
//! twice: with plain `f64` to obtain residuals, and with first-order dual numbers
//! ([`Dual64`]) to obtain exact Jacobian columns. The pose has three parameters
//! `[x, y, theta]`, so a full `N × 3` Jacobian takes three dual passes, each seeding the
//! derivative part of one parameter with 1.
//!
//! ```text
//! r(x + ε·eⱼ) = r(x) + ε·∂r/∂xⱼ
//! ```
//!
//! Non-smooth operations (cell lookup in a discretized grid) read the real part through
//! [`AutoDiffScalar::value`] and re-enter the computation as constants, so derivatives
//! flow only through the smooth parts of the expression.

use nalgebra::{DVector, MatrixXx3, Vector3};
use num_dual::{Dual64, DualNum};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Number of pose parameters (`x`, `y`, `theta`).
pub const POSE_PARAMETERS: usize = 3;

/// Scalar type a cost functor can be evaluated with.
///
/// Implemented for `f64` (plain evaluation) and [`Dual64`] (one directional derivative).
pub trait AutoDiffScalar:
    Copy
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lift a constant into the scalar type (zero derivative).
    fn constant(value: f64) -> Self;

    /// Real part of the scalar.
    fn value(&self) -> f64;

    fn sin(self) -> Self;

    fn cos(self) -> Self;
}

impl AutoDiffScalar for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }

    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }
}

impl AutoDiffScalar for Dual64 {
    #[inline]
    fn constant(value: f64) -> Self {
        Dual64::new(value, 0.0)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.re
    }

    #[inline]
    fn sin(self) -> Self {
        DualNum::sin(&self)
    }

    #[inline]
    fn cos(self) -> Self {
        DualNum::cos(&self)
    }
}

/// A residual function of the pose, generic over the evaluation scalar.
///
/// Implementors must return exactly [`CostFunctor::num_residuals`] values for every
/// scalar type, and must not branch on anything but real parts.
pub trait CostFunctor: Send + Sync {
    /// Number of residuals produced per evaluation.
    fn num_residuals(&self) -> usize;

    /// Evaluate the residuals at `pose = [x, y, theta]`.
    fn evaluate<T: AutoDiffScalar>(&self, pose: &[T; POSE_PARAMETERS]) -> Vec<T>;
}

/// Evaluate a functor's residuals with plain floating point.
pub fn evaluate_residuals<F: CostFunctor + ?Sized>(
    functor: &F,
    params: &Vector3<f64>,
) -> DVector<f64> {
    let pose = [params.x, params.y, params.z];
    DVector::from_vec(functor.evaluate(&pose))
}

/// Evaluate a functor's `N × 3` Jacobian with three forward-mode passes.
///
/// Row `i`, column `j` holds `∂rᵢ/∂paramⱼ`. Rows beyond what the functor returns stay zero.
pub fn evaluate_jacobian<F: CostFunctor + ?Sized>(
    functor: &F,
    params: &Vector3<f64>,
) -> MatrixXx3<f64> {
    let mut jacobian = MatrixXx3::zeros(functor.num_residuals());
    for column in 0..POSE_PARAMETERS {
        let seeded: [Dual64; POSE_PARAMETERS] = std::array::from_fn(|i| {
            Dual64::new(params[i], if i == column { 1.0 } else { 0.0 })
        });
        for (row, residual) in functor
            .evaluate(&seeded)
            .iter()
            .take(jacobian.nrows())
            .enumerate()
        {
            jacobian[(row, column)] = residual.eps;
        }
    }
    jacobian
}
