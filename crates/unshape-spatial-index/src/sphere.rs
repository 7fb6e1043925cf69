use glam::{Vec2, Vec3};

use crate::SpatialError;
use crate::aabb::Aabb;
use crate::point::{Point, Scalar};

/// A circle (2D) or sphere (3D).
///
/// The boundary is part of the sphere. A zero radius makes it a single
/// point; a negative or NaN radius describes an empty region that contains
/// and intersects nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sphere<P: Point> {
    /// Center of the sphere.
    pub center: P,
    /// Radius of the sphere.
    pub radius: P::Scalar,
}

/// 2D circle.
pub type Circle = Sphere<Vec2>;

/// 3D sphere.
pub type Sphere3 = Sphere<Vec3>;

impl<P: Point> Sphere<P> {
    /// Creates a new sphere without validating the radius.
    pub fn new(center: P, radius: P::Scalar) -> Self {
        Self { center, radius }
    }

    /// Creates a new sphere, rejecting negative and NaN radii.
    pub fn try_new(center: P, radius: P::Scalar) -> Result<Self, SpatialError> {
        if radius >= P::Scalar::ZERO {
            Ok(Self { center, radius })
        } else {
            Err(SpatialError::InvalidRadius(radius.to_f64()))
        }
    }

    /// Returns `false` when the radius is negative or NaN.
    pub fn is_valid(&self) -> bool {
        self.radius >= P::Scalar::ZERO
    }

    /// Squared radius.
    pub fn radius_squared(&self) -> P::Scalar {
        self.radius * self.radius
    }

    /// Checks if the sphere contains `point` (boundary included).
    pub fn contains_point(&self, point: P) -> bool {
        self.is_valid() && self.center.distance_squared(point) <= self.radius_squared()
    }

    /// Checks if the sphere touches or overlaps `aabb`.
    pub fn intersects_aabb(&self, aabb: &Aabb<P>) -> bool {
        self.is_valid() && aabb.distance_squared_to_point(self.center) <= self.radius_squared()
    }

    /// Smallest AABB enclosing the sphere; empty when the radius is invalid.
    pub fn bounding_box(&self) -> Aabb<P> {
        if !self.is_valid() {
            return Aabb::empty();
        }
        Aabb::from_center_half_extents(self.center, P::splat(self.radius))
    }
}
