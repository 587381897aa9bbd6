//! Planar pose representation and angle utilities.
//!
//! - **SE(2)**: rigid transformations in 2D, the pose refined by the scan matcher
//!
//! Lie group M,° | size | dim | X ∈ M             | Constraint | Comp. | Action
//! ------------- | ---- | --- | ----------------- | ---------- | ----- | ------
//! Rigid motion  | 9    | 3   | M = [R t; 0 1]    | RᵀR = I    | M₁M₂  | Rx+t
//!
//! The optimizer works on the flat parameter vector `[x, y, theta]` and never on the group
//! directly; angular differences are wrapped with [`wrap_angle`] wherever they enter a
//! residual, so `theta` may leave `(-π, π]` during iterations.

use crate::core::autodiff::AutoDiffScalar;
use std::f64::consts::PI;

pub mod se2;

pub use se2::SE2;

/// Wrap an angle into `(-π, π]`.
///
/// ```
/// use apex_scan_matcher::manifold::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(2.0 * PI - 0.02) + 0.02).abs() < 1e-12);
/// assert_eq!(normalize_angle(-PI), PI);
/// ```
pub fn normalize_angle(angle: f64) -> f64 {
    wrap_angle(angle)
}

/// Differentiable angle wrap into `(-π, π]`.
///
/// The number of full turns is decided on the real part and removed as a constant, so
/// the derivative passes through unchanged.
pub fn wrap_angle<T: AutoDiffScalar>(angle: T) -> T {
    let turns = ((angle.value() - PI) / (2.0 * PI)).ceil();
    if turns == 0.0 {
        angle
    } else {
        angle - T::constant(2.0 * PI * turns)
    }
}
