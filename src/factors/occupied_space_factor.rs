//! Occupied-space cost: scan points should land on high occupancy.

use nalgebra::Point2;

use crate::core::autodiff::{AutoDiffScalar, CostFunctor, POSE_PARAMETERS};
use crate::grid::{ProbabilityGridView, bilinear_probability};
use crate::manifold::se2::transform_point;
use crate::sensor::PointCloud2D;

/// One residual per scan point: `w/√N · (1 - P(T·pᵢ))`.
///
/// Dividing the weight by `√N` makes the summed squared cost independent of how many
/// points the scan has. An empty scan produces no residuals.
///
/// The grid is read through bilinear interpolation; points off the map read as free
/// space (see [`crate::grid`]).
pub struct OccupiedSpaceFactor<'a, G: ?Sized> {
    points: &'a [Point2<f64>],
    grid: &'a G,
    per_point_weight: f64,
}

impl<'a, G: ProbabilityGridView + ?Sized> OccupiedSpaceFactor<'a, G> {
    pub fn new(weight: f64, scan: &'a PointCloud2D, grid: &'a G) -> Self {
        let per_point_weight = if scan.is_empty() {
            0.0
        } else {
            weight / (scan.len() as f64).sqrt()
        };
        Self {
            points: scan.points(),
            grid,
            per_point_weight,
        }
    }

    pub fn per_point_weight(&self) -> f64 {
        self.per_point_weight
    }
}

impl<G: ProbabilityGridView + ?Sized> CostFunctor for OccupiedSpaceFactor<'_, G> {
    fn num_residuals(&self) -> usize {
        self.points.len()
    }

    fn evaluate<T: AutoDiffScalar>(&self, pose: &[T; POSE_PARAMETERS]) -> Vec<T> {
        let weight = T::constant(self.per_point_weight);
        let one = T::constant(1.0);
        self.points
            .iter()
            .map(|point| {
                let [x, y] = transform_point(pose, point);
                weight * (one - bilinear_probability(self.grid, x, y))
            })
            .collect()
    }
}
