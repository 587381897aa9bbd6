//! Laser scans as ordered 2D point clouds in the sensor frame.

use nalgebra::Point2;

use crate::manifold::SE2;

/// Ordered 2D points in the sensor frame. May be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud2D {
    points: Vec<Point2<f64>>,
}

impl PointCloud2D {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Convert a polar range scan into points.
    ///
    /// Beam `i` has bearing `angle_min + i·angle_increment`. Beams with non-finite ranges or
    /// ranges outside `[range_min, range_max]` are dropped.
    pub fn from_polar_ranges(
        angle_min: f64,
        angle_increment: f64,
        ranges: &[f64],
        range_min: f64,
        range_max: f64,
    ) -> Self {
        ranges
            .iter()
            .enumerate()
            .filter(|(_, range)| range.is_finite() && **range >= range_min && **range <= range_max)
            .map(|(i, range)| {
                let bearing = angle_min + i as f64 * angle_increment;
                Point2::new(range * bearing.cos(), range * bearing.sin())
            })
            .collect()
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point2<f64>> {
        self.points.iter()
    }

    /// Points mapped into the frame in which `pose` is expressed.
    pub fn transformed(&self, pose: &SE2) -> PointCloud2D {
        self.points
            .iter()
            .map(|point| pose.transform_point(point))
            .collect()
    }
}

impl FromIterator<Point2<f64>> for PointCloud2D {
    fn from_iter<I: IntoIterator<Item = Point2<f64>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PointCloud2D {
    type Item = &'a Point2<f64>;
    type IntoIter = std::slice::Iter<'a, Point2<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
