use crate::aabb::Aabb;
use crate::point::{Point, Scalar};

/// A line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment<P> {
    /// Start point (`t = 0`).
    pub start: P,
    /// End point (`t = 1`).
    pub end: P,
}

impl<P: Point> Segment<P> {
    /// Creates a new segment.
    pub fn new(start: P, end: P) -> Self {
        Self { start, end }
    }

    /// Returns the point at parameter `t` along the segment.
    pub fn at(&self, t: P::Scalar) -> P {
        self.start + (self.end - self.start).scale(t)
    }

    /// Squared length of the segment.
    pub fn length_squared(&self) -> P::Scalar {
        self.start.distance_squared(self.end)
    }

    /// Parameter in `[0, 1]` of the point on the segment closest to `point`.
    ///
    /// Segments shorter than [`Scalar::EPSILON`] collapse to their start.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn closest_parameter(&self, point: P) -> P::Scalar {
        let direction = self.end - self.start;
        let length_squared = direction.dot(direction);
        if !(length_squared > P::Scalar::EPSILON) {
            return P::Scalar::ZERO;
        }
        let t = (point - self.start).dot(direction) / length_squared;
        t.max(P::Scalar::ZERO).min(P::Scalar::ONE)
    }

    /// Point on the segment closest to `point`.
    pub fn closest_point(&self, point: P) -> P {
        self.at(self.closest_parameter(point))
    }

    /// Squared distance from `point` to the segment.
    pub fn distance_squared_to_point(&self, point: P) -> P::Scalar {
        self.closest_point(point).distance_squared(point)
    }

    /// Clips the segment against `aabb` using the slab method.
    ///
    /// Returns the parameter interval `(t_enter, t_exit)` within `[0, 1]`
    /// where the segment lies inside the box, or `None` if it misses.
    /// Touching a face, edge or corner counts as a hit. Axes along which the
    /// segment barely moves are treated as parallel, so near-zero direction
    /// components never produce infinities.
    pub fn clip_aabb(&self, aabb: &Aabb<P>) -> Option<(P::Scalar, P::Scalar)> {
        if aabb.is_empty() {
            return None;
        }

        let mut t_min = P::Scalar::ZERO;
        let mut t_max = P::Scalar::ONE;

        for axis in 0..P::DIM {
            let origin = self.start.axis(axis);
            let delta = self.end.axis(axis) - origin;
            let lo = aabb.min.axis(axis);
            let hi = aabb.max.axis(axis);

            if delta.abs() <= P::Scalar::EPSILON {
                // The whole span along this axis must miss the slab to reject.
                let end = self.end.axis(axis);
                if origin.max(end) < lo || origin.min(end) > hi {
                    return None;
                }
                continue;
            }

            let inv = P::Scalar::ONE / delta;
            let mut t1 = (lo - origin) * inv;
            let mut t2 = (hi - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        Some((t_min, t_max))
    }

    /// Checks if the segment touches or crosses `aabb`.
    pub fn intersects_aabb(&self, aabb: &Aabb<P>) -> bool {
        self.clip_aabb(aabb).is_some()
    }
}
