use glam::{Vec2, Vec3};

use crate::point::{Point, Scalar};
use crate::sphere::Sphere;

/// Axis-aligned bounding box over any [`Point`] type.
///
/// Boxes are closed: every face belongs to the box, so a point lying exactly
/// on `min` or `max` is contained and two boxes sharing only a face intersect.
/// Zero-size boxes (`min == max`) are valid and behave as a single point.
///
/// [`Aabb::empty`] is the distinguished box with no interior (`min = +inf`,
/// `max = -inf`). It is the identity for [`Aabb::union`] and intersects
/// nothing, not even itself.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb<P> {
    /// Minimum corner.
    pub min: P,
    /// Maximum corner.
    pub max: P,
}

/// 2D axis-aligned bounding box.
pub type Aabb2 = Aabb<Vec2>;

/// 3D axis-aligned bounding box.
pub type Aabb3 = Aabb<Vec3>;

impl<P: Point> Aabb<P> {
    /// Creates a new AABB from min and max corners.
    pub fn new(min: P, max: P) -> Self {
        Self { min, max }
    }

    /// The empty box.
    pub fn empty() -> Self {
        Self {
            min: P::splat(P::Scalar::INFINITY),
            max: P::splat(P::Scalar::NEG_INFINITY),
        }
    }

    /// Creates an AABB from center and half-extents.
    pub fn from_center_half_extents(center: P, half_extents: P) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Tight box around `points`; empty for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = P>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Self::empty(), |acc, point| acc.expand(point))
    }

    /// Returns `true` if any axis has `min > max` (or a NaN bound).
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn is_empty(&self) -> bool {
        (0..P::DIM).any(|axis| !(self.min.axis(axis) <= self.max.axis(axis)))
    }

    /// Returns the center of the AABB.
    pub fn center(&self) -> P {
        (self.min + self.max).scale(P::Scalar::HALF)
    }

    /// Returns the size of the AABB; zero for the empty box.
    pub fn size(&self) -> P {
        if self.is_empty() {
            P::splat(P::Scalar::ZERO)
        } else {
            self.max - self.min
        }
    }

    /// Returns the half-extents (half-size) of the AABB.
    pub fn half_extents(&self) -> P {
        self.size().scale(P::Scalar::HALF)
    }

    /// Area in 2D, volume in 3D; zero for the empty box.
    pub fn volume(&self) -> P::Scalar {
        let size = self.size();
        (0..P::DIM).fold(P::Scalar::ONE, |acc, axis| acc * size.axis(axis))
    }

    /// Checks if this AABB contains a point (inclusive on every face).
    pub fn contains_point(&self, point: P) -> bool {
        (0..P::DIM).all(|axis| {
            let c = point.axis(axis);
            self.min.axis(axis) <= c && c <= self.max.axis(axis)
        })
    }

    /// Checks if `other` lies entirely inside this AABB.
    ///
    /// The empty box is contained by nothing.
    pub fn contains_aabb(&self, other: &Aabb<P>) -> bool {
        !other.is_empty() && self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Checks if this AABB intersects another AABB (touching faces count).
    pub fn intersects(&self, other: &Aabb<P>) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (0..P::DIM).all(|axis| {
                self.min.axis(axis) <= other.max.axis(axis)
                    && self.max.axis(axis) >= other.min.axis(axis)
            })
    }

    /// Returns the union of two AABBs.
    pub fn union(&self, other: &Aabb<P>) -> Aabb<P> {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Returns this AABB grown to include `point`.
    pub fn expand(&self, point: P) -> Aabb<P> {
        Aabb::new(self.min.min(point), self.max.max(point))
    }

    /// Closest point inside the box to `point` (per-axis clamp).
    ///
    /// Meaningless for the empty box; check [`Aabb::is_empty`] first.
    pub fn closest_point(&self, point: P) -> P {
        point.max(self.min).min(self.max)
    }

    /// Squared distance from `point` to the box; zero inside, infinite for the empty box.
    pub fn distance_squared_to_point(&self, point: P) -> P::Scalar {
        if self.is_empty() {
            return P::Scalar::INFINITY;
        }
        self.closest_point(point).distance_squared(point)
    }

    /// Checks if `sphere` touches or overlaps this box.
    pub fn intersects_sphere(&self, sphere: &Sphere<P>) -> bool {
        sphere.intersects_aabb(self)
    }

    /// Bounds of orthant `index` when splitting this box at its center.
    ///
    /// Bit `a` of `index` selects the upper half along axis `a`, so indices
    /// `0..4` cover a 2D box and `0..8` a 3D box. Children share their
    /// boundary faces with their siblings.
    pub fn child_bounds(&self, index: usize) -> Aabb<P> {
        let center = self.center();
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..P::DIM {
            if index & (1 << axis) != 0 {
                min = min.with_axis(axis, center.axis(axis));
            } else {
                max = max.with_axis(axis, center.axis(axis));
            }
        }
        Aabb::new(min, max)
    }

    /// Index of the orthant of this box (see [`Aabb::child_bounds`]) that `point` belongs to.
    ///
    /// Points on a splitting plane go to the upper orthant.
    pub fn child_index(&self, point: P) -> usize {
        let center = self.center();
        (0..P::DIM).fold(0, |index, axis| {
            if point.axis(axis) >= center.axis(axis) {
                index | (1 << axis)
            } else {
                index
            }
        })
    }
}
