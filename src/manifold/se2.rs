//! SE(2) - Special Euclidean Group in 2D
//!
//! This module implements the planar pose used by the scan matcher: a rigid body
//! transformation made of a 2D rotation and a Vector2 translation.
//!
//! The optimizer's flat parameter layout is `[x, y, theta]`; conversions to and from
//! `Vector3<f64>` use that order.

use crate::core::autodiff::AutoDiffScalar;
use nalgebra::{Isometry2, Matrix2, Point2, Translation2, UnitComplex, Vector2, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// SE(2) group element representing a robot pose in the map frame.
///
/// Represented as a combination of 2D rotation and Vector2 translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE2 {
    /// Translation part as Vector2
    translation: Vector2<f64>,
    /// Rotation part as UnitComplex
    rotation: UnitComplex<f64>,
}

impl Display for SE2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let t = self.translation();
        write!(
            f,
            "SE2(translation: [{:.4}, {:.4}], rotation: {:.4})",
            t.x,
            t.y,
            self.angle()
        )
    }
}

impl Default for SE2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Vector3<f64>> for SE2 {
    fn from(data: Vector3<f64>) -> Self {
        SE2::from_xy_angle(data[0], data[1], data[2])
    }
}

impl From<SE2> for Vector3<f64> {
    fn from(se2: SE2) -> Self {
        se2.to_vector()
    }
}

impl SE2 {
    /// Identity transformation.
    pub fn identity() -> Self {
        SE2 {
            translation: Vector2::zeros(),
            rotation: UnitComplex::identity(),
        }
    }

    pub fn new(translation: Vector2<f64>, rotation: UnitComplex<f64>) -> Self {
        SE2 {
            translation,
            rotation,
        }
    }

    /// Create SE2 from position and heading. The heading is stored wrapped to `(-π, π]`.
    pub fn from_xy_angle(x: f64, y: f64, theta: f64) -> Self {
        SE2::new(Vector2::new(x, y), UnitComplex::from_angle(theta))
    }

    pub fn from_isometry(isometry: Isometry2<f64>) -> Self {
        SE2::new(isometry.translation.vector, isometry.rotation)
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    pub fn rotation_complex(&self) -> UnitComplex<f64> {
        self.rotation
    }

    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::from_parts(Translation2::from(self.translation), self.rotation)
    }

    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    /// Heading in `(-π, π]`.
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    /// Flat parameter vector `[x, y, theta]`.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.translation.x, self.translation.y, self.angle())
    }

    /// Map a point from the local frame of this pose into the parent frame: `R·p + t`.
    pub fn transform_point(&self, point: &Point2<f64>) -> Point2<f64> {
        self.rotation.transform_point(point) + self.translation
    }

    /// Composition `self ∘ other`.
    pub fn compose(&self, other: &SE2) -> SE2 {
        SE2::new(
            self.rotation.transform_vector(&other.translation) + self.translation,
            self.rotation * other.rotation,
        )
    }

    /// Inverse transformation: `[Rᵀ, -Rᵀ·t]`.
    pub fn inverse(&self) -> SE2 {
        let rot_inv = self.rotation.inverse();
        SE2::new(-(rot_inv * self.translation), rot_inv)
    }

    /// Relative pose `self⁻¹ ∘ other`.
    pub fn between(&self, other: &SE2) -> SE2 {
        self.inverse().compose(other)
    }
}

/// Transform a sensor-frame point by a pose given as raw parameters `[x, y, theta]`.
///
/// Generic counterpart of [`SE2::transform_point`] used inside cost functors.
pub fn transform_point<T: AutoDiffScalar>(pose: &[T; 3], point: &Point2<f64>) -> [T; 2] {
    let [x, y, theta] = *pose;
    let (sin, cos) = (theta.sin(), theta.cos());
    let px = T::constant(point.x);
    let py = T::constant(point.y);
    [cos * px - sin * py + x, sin * px + cos * py + y]
}
