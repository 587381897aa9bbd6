//! Cost functors of the scan-matching objective.
//!
//! Each factor computes a residual vector and its Jacobian with respect to the pose
//! parameter vector `[x, y, theta]`. The objective minimized for one match is
//!
//! ```text
//! ½ Σᵢ (w_o/√N · (1 - P(T·pᵢ)))²  +  ½ ||w_t · (t - t_prev)||²  +  ½ (w_r · wrap(θ - θ_init))²
//! ```
//!
//! # Factor Types
//!
//! - [`OccupiedSpaceFactor`]: pulls transformed scan points toward high occupancy
//! - [`TranslationDeltaFactor`]: keeps the translation near the previous pose
//! - [`RotationDeltaFactor`]: keeps the heading near the initial estimate
//!
//! The three are written as generic [`CostFunctor`]s and differentiated automatically by
//! [`AutoDiffCostFunction`], which adapts them to the object-safe [`Factor`] trait used by
//! the [`Problem`](crate::core::problem::Problem).

use nalgebra::{DVector, MatrixXx3, Vector3};

use crate::core::autodiff::{self, CostFunctor};

pub mod occupied_space_factor;
pub mod rotation_delta_factor;
pub mod translation_delta_factor;

pub use occupied_space_factor::OccupiedSpaceFactor;
pub use rotation_delta_factor::RotationDeltaFactor;
pub use translation_delta_factor::TranslationDeltaFactor;

/// Trait for factor implementations in the pose refinement problem.
///
/// A factor computes the residual and Jacobian for the current pose parameters, which are
/// used by the optimizer to minimize the total cost.
///
/// # Thread Safety
///
/// Factors must be `Send + Sync` to enable parallel residual/Jacobian evaluation.
///
/// # Example
///
/// ```
/// use apex_scan_matcher::factors::Factor;
/// use nalgebra::{DVector, MatrixXx3, Vector3};
///
/// // Distance of the robot from a known beacon at the origin
/// struct RangeFactor {
///     measurement: f64,
/// }
///
/// impl Factor for RangeFactor {
///     fn linearize(&self, params: &Vector3<f64>, compute_jacobian: bool) -> (DVector<f64>, Option<MatrixXx3<f64>>) {
///         let predicted = (params.x * params.x + params.y * params.y).sqrt();
///         let residual = DVector::from_vec(vec![predicted - self.measurement]);
///         let jacobian = compute_jacobian.then(|| {
///             MatrixXx3::from_row_slice(&[params.x / predicted, params.y / predicted, 0.0])
///         });
///         (residual, jacobian)
///     }
///
///     fn get_dimension(&self) -> usize { 1 }
/// }
/// ```
pub trait Factor: Send + Sync {
    /// Compute the residual and Jacobian at the given pose parameters.
    ///
    /// # Returns
    ///
    /// Tuple `(residual, jacobian)` where:
    /// - `residual`: N-dimensional error vector
    /// - `jacobian`: N × 3 matrix, present when `compute_jacobian` is set
    fn linearize(
        &self,
        params: &Vector3<f64>,
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<MatrixXx3<f64>>);

    /// Get the dimension of the residual vector.
    ///
    /// - Occupied space: number of scan points
    /// - Translation delta: 2
    /// - Rotation delta: 1
    fn get_dimension(&self) -> usize;
}

/// Adapts a generic [`CostFunctor`] to [`Factor`] using forward-mode dual numbers.
#[derive(Debug, Clone)]
pub struct AutoDiffCostFunction<F> {
    functor: F,
}

impl<F: CostFunctor> AutoDiffCostFunction<F> {
    pub fn new(functor: F) -> Self {
        Self { functor }
    }

    pub fn functor(&self) -> &F {
        &self.functor
    }
}

impl<F: CostFunctor> Factor for AutoDiffCostFunction<F> {
    fn linearize(
        &self,
        params: &Vector3<f64>,
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<MatrixXx3<f64>>) {
        let residual = autodiff::evaluate_residuals(&self.functor, params);
        let jacobian = compute_jacobian.then(|| autodiff::evaluate_jacobian(&self.functor, params));
        (residual, jacobian)
    }

    fn get_dimension(&self) -> usize {
        self.functor.num_residuals()
    }
}

/// Central finite-difference Jacobian, used by the factor tests to check autodiff output.
#[cfg(test)]
pub(crate) fn numeric_jacobian<F: CostFunctor>(functor: &F, params: &Vector3<f64>) -> MatrixXx3<f64> {
    const H: f64 = 1e-6;
    let mut jacobian = MatrixXx3::zeros(functor.num_residuals());
    for column in 0..3 {
        let mut plus = *params;
        let mut minus = *params;
        plus[column] += H;
        minus[column] -= H;
        let difference = autodiff::evaluate_residuals(functor, &plus)
            - autodiff::evaluate_residuals(functor, &minus);
        jacobian.set_column(column, &(difference / (2.0 * H)));
    }
    jacobian
}
