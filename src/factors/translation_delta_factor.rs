//! Translation prior toward the previous pose.

use nalgebra::Vector2;

use crate::core::autodiff::{AutoDiffScalar, CostFunctor, POSE_PARAMETERS};

/// Penalizes translation away from a target: `r = w · (t - t_target)`.
///
/// The target is the translation of the previously accepted pose, not of the initial
/// estimate. A weight of 0 disables the prior (residuals are identically zero).
#[derive(Debug, Clone)]
pub struct TranslationDeltaFactor {
    target: Vector2<f64>,
    weight: f64,
}

impl TranslationDeltaFactor {
    pub fn new(target: Vector2<f64>, weight: f64) -> Self {
        Self { target, weight }
    }

    pub fn target(&self) -> Vector2<f64> {
        self.target
    }
}

impl CostFunctor for TranslationDeltaFactor {
    fn num_residuals(&self) -> usize {
        2
    }

    fn evaluate<T: AutoDiffScalar>(&self, pose: &[T; POSE_PARAMETERS]) -> Vec<T> {
        let weight = T::constant(self.weight);
        vec![
            weight * (pose[0] - T::constant(self.target.x)),
            weight * (pose[1] - T::constant(self.target.y)),
        ]
    }
}
