use std::cmp::Ordering;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use glam::{DVec2, DVec3, Vec2, Vec3};

/// Floating-point coordinate type (`f32` or `f64`).
pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;
    /// One half.
    const HALF: Self;
    /// Threshold below which lengths and denominators count as zero.
    const EPSILON: Self;
    /// Positive infinity.
    const INFINITY: Self;
    /// Negative infinity.
    const NEG_INFINITY: Self;

    /// IEEE 754 total ordering; NaN sorts after +inf.
    fn total_cmp(&self, other: &Self) -> Ordering;

    /// Square root.
    fn sqrt(self) -> Self;

    /// Absolute value.
    fn abs(self) -> Self;

    /// Minimum of two values, ignoring NaN.
    fn min(self, other: Self) -> Self;

    /// Maximum of two values, ignoring NaN.
    fn max(self, other: Self) -> Self;

    /// Returns `true` for NaN.
    fn is_nan(self) -> bool;

    /// Returns `true` when neither infinite nor NaN.
    fn is_finite(self) -> bool;

    /// Floors to an integer cell coordinate, saturating at the `i32` range (NaN maps to 0).
    fn floor_to_cell(self) -> i32;

    /// Converts from `f64`, rounding where needed.
    fn from_f64(value: f64) -> Self;

    /// Converts to `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_scalar {
    ($t:ty, $eps:expr) => {
        impl Scalar for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const HALF: Self = 0.5;
            const EPSILON: Self = $eps;
            const INFINITY: Self = <$t>::INFINITY;
            const NEG_INFINITY: Self = <$t>::NEG_INFINITY;

            #[inline]
            fn total_cmp(&self, other: &Self) -> Ordering {
                <$t>::total_cmp(self, other)
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }

            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            #[inline]
            fn min(self, other: Self) -> Self {
                <$t>::min(self, other)
            }

            #[inline]
            fn max(self, other: Self) -> Self {
                <$t>::max(self, other)
            }

            #[inline]
            fn is_nan(self) -> bool {
                <$t>::is_nan(self)
            }

            #[inline]
            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }

            #[inline]
            fn floor_to_cell(self) -> i32 {
                // `as` saturates and maps NaN to 0.
                <$t>::floor(self) as i32
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_scalar!(f32, 1e-6);
impl_scalar!(f64, 1e-12);

mod sealed {
    pub trait Sealed {}

    impl Sealed for glam::Vec2 {}
    impl Sealed for glam::Vec3 {}
    impl Sealed for glam::DVec2 {}
    impl Sealed for glam::DVec3 {}
}

/// A position in 2D or 3D space.
///
/// Implemented for the glam vector types so callers can index whatever they
/// already use for positions. Method names follow glam, so generic code reads
/// the same as code written against `Vec2`/`Vec3` directly.
///
/// The trait is sealed: every index assumes `DIM` is 2 or 3 (orthants,
/// three-axis cell keys), so no other implementations are accepted.
pub trait Point:
    sealed::Sealed + Copy + Debug + PartialEq + Send + Sync + 'static + Add<Output = Self> + Sub<Output = Self>
{
    /// Coordinate type.
    type Scalar: Scalar;

    /// Number of axes (2 or 3).
    const DIM: usize;

    /// A point with every component set to `value`.
    fn splat(value: Self::Scalar) -> Self;

    /// Component along `axis` (`0 = x`, `1 = y`, `2 = z`).
    fn axis(self, axis: usize) -> Self::Scalar;

    /// Copy of this point with the component along `axis` replaced.
    fn with_axis(self, axis: usize, value: Self::Scalar) -> Self;

    /// Component-wise minimum.
    fn min(self, other: Self) -> Self;

    /// Component-wise maximum.
    fn max(self, other: Self) -> Self;

    /// Multiplies every component by `factor`.
    fn scale(self, factor: Self::Scalar) -> Self;

    /// Dot product.
    fn dot(self, other: Self) -> Self::Scalar;

    /// Squared Euclidean distance.
    fn distance_squared(self, other: Self) -> Self::Scalar;
}

macro_rules! impl_point {
    ($v:ty, $s:ty, $dim:expr) => {
        impl Point for $v {
            type Scalar = $s;
            const DIM: usize = $dim;

            #[inline]
            fn splat(value: $s) -> Self {
                <$v>::splat(value)
            }

            #[inline]
            fn axis(self, axis: usize) -> $s {
                self[axis]
            }

            #[inline]
            fn with_axis(mut self, axis: usize, value: $s) -> Self {
                self[axis] = value;
                self
            }

            #[inline]
            fn min(self, other: Self) -> Self {
                <$v>::min(self, other)
            }

            #[inline]
            fn max(self, other: Self) -> Self {
                <$v>::max(self, other)
            }

            #[inline]
            fn scale(self, factor: $s) -> Self {
                self * factor
            }

            #[inline]
            fn dot(self, other: Self) -> $s {
                <$v>::dot(self, other)
            }

            #[inline]
            fn distance_squared(self, other: Self) -> $s {
                <$v>::distance_squared(self, other)
            }
        }
    };
}

impl_point!(Vec2, f32, 2);
impl_point!(Vec3, f32, 3);
impl_point!(DVec2, f64, 2);
impl_point!(DVec3, f64, 3);
