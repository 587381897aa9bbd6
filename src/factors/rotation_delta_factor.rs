//! Heading prior toward the initial estimate.

use crate::core::autodiff::{AutoDiffScalar, CostFunctor, POSE_PARAMETERS};
use crate::manifold::wrap_angle;

/// Penalizes heading away from a target: `r = w · wrap(θ - θ_target)`.
///
/// The difference is wrapped into `(-π, π]` before weighting, so headings on either
/// side of ±π are treated as close.
#[derive(Debug, Clone)]
pub struct RotationDeltaFactor {
    target_angle: f64,
    weight: f64,
}

impl RotationDeltaFactor {
    pub fn new(target_angle: f64, weight: f64) -> Self {
        Self {
            target_angle,
            weight,
        }
    }

    pub fn target_angle(&self) -> f64 {
        self.target_angle
    }
}

impl CostFunctor for RotationDeltaFactor {
    fn num_residuals(&self) -> usize {
        1
    }

    fn evaluate<T: AutoDiffScalar>(&self, pose: &[T; POSE_PARAMETERS]) -> Vec<T> {
        let delta = wrap_angle(pose[2] - T::constant(self.target_angle));
        vec![T::constant(self.weight) * delta]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::autodiff::{evaluate_jacobian, evaluate_residuals};
    use nalgebra::Vector3;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_residual_is_weighted_difference() {
        let factor = RotationDeltaFactor::new(0.2, 40.0);
        let residual = evaluate_residuals(&factor, &Vector3::new(5.0, 5.0, 0.25));
        assert!((residual[0] - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_difference_wraps_across_pi() {
        let weight = 10.0;
        let factor = RotationDeltaFactor::new(-PI + 0.01, weight);
        let params = Vector3::new(0.0, 0.0, PI - 0.01);

        let residual = evaluate_residuals(&factor, &params);
        assert!((residual[0] + 0.02 * weight).abs() < TOLERANCE);

        let jacobian = evaluate_jacobian(&factor, &params);
        assert!((jacobian[(0, 2)] - weight).abs() < TOLERANCE);
        assert_eq!(jacobian[(0, 0)], 0.0);
        assert_eq!(jacobian[(0, 1)], 0.0);
    }

    #[test]
    fn test_parameter_beyond_pi_still_wraps() {
        let factor = RotationDeltaFactor::new(PI - 0.05, 1.0);
        let residual = evaluate_residuals(&factor, &Vector3::new(0.0, 0.0, PI + 0.05));
        assert!((residual[0] - 0.1).abs() < TOLERANCE);
    }
}
