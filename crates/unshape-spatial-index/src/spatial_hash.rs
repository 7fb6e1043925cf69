use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

use crate::SpatialError;
use crate::aabb::Aabb;
use crate::buffer::QueryBuffer;
use crate::config::SpatialHashConfig;
use crate::point::{Point, Scalar};
use crate::query::SpatialQuery;
use crate::sphere::Sphere;

/// Integer grid coordinates of a cell; unused axes are 0.
pub type CellKey = [i32; 3];

/// An entry in the spatial hash grid.
#[derive(Debug, Clone)]
pub(crate) struct SpatialHashEntry<T, P> {
    pub position: P,
    pub data: T,
}

/// A spatial hash grid over 2D or 3D points.
///
/// Divides space into a uniform grid and maps elements to cells based on
/// their positions. Efficient for uniformly distributed points that are
/// rebuilt every frame: construction is a single `O(n)` pass.
///
/// # Example
///
/// ```
/// use unshape_spatial_index::{SpatialHash3D, SpatialHashConfig};
/// use glam::Vec3;
///
/// let points = vec![
///     (Vec3::new(5.0, 5.0, 5.0), "A"),
///     (Vec3::new(15.0, 5.0, 5.0), "B"),
///     (Vec3::new(5.5, 5.5, 5.5), "C"), // Same cell as A
/// ];
/// let hash = SpatialHash3D::build(points, |(p, _)| *p, SpatialHashConfig::new(10.0))?;
///
/// let mut nearby = Vec::new();
/// hash.cell_query(Vec3::new(5.0, 5.0, 5.0), &mut nearby);
/// assert_eq!(nearby.len(), 2); // A and C
/// # Ok::<(), unshape_spatial_index::SpatialError>(())
/// ```
#[derive(Debug)]
pub struct SpatialHash<T, P: Point> {
    cell_size: P::Scalar,
    inv_cell_size: P::Scalar,
    cells: FxHashMap<CellKey, Vec<SpatialHashEntry<T, P>>>,
    len: usize,
}

/// A 2D spatial hash.
pub type SpatialHash2D<T> = SpatialHash<T, Vec2>;

/// A 3D spatial hash.
pub type SpatialHash3D<T> = SpatialHash<T, Vec3>;

impl<T, P: Point> SpatialHash<T, P> {
    /// Buckets every element by the cell containing its position.
    ///
    /// `key_of` is called exactly once per element, in iteration order.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidCellSize`] if the cell size is not
    /// positive and finite, including after conversion to the point's scalar type.
    pub fn build<I, F>(elements: I, mut key_of: F, config: SpatialHashConfig) -> Result<Self, SpatialError>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> P,
    {
        config.validate()?;
        let cell_size = P::Scalar::from_f64(config.cell_size);
        let inv_cell_size = P::Scalar::ONE / cell_size;
        if !(cell_size > P::Scalar::ZERO && cell_size.is_finite() && inv_cell_size.is_finite()) {
            return Err(SpatialError::InvalidCellSize(config.cell_size));
        }

        let mut hash = Self {
            cell_size,
            inv_cell_size,
            cells: FxHashMap::default(),
            len: 0,
        };
        for data in elements {
            let position = key_of(&data);
            let key = hash.cell_of(position);
            hash.cells
                .entry(key)
                .or_default()
                .push(SpatialHashEntry { position, data });
            hash.len += 1;
        }

        log::debug!(
            "built spatial hash: {} elements in {} cells of size {:?}",
            hash.len,
            hash.cells.len(),
            hash.cell_size
        );
        Ok(hash)
    }

    /// Returns the cell size.
    pub fn cell_size(&self) -> P::Scalar {
        self.cell_size
    }

    /// Returns the number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns the total number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over `(position, element)` pairs, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = (P, &T)> {
        self.cells
            .values()
            .flat_map(|bucket| bucket.iter().map(|e| (e.position, &e.data)))
    }

    /// Cell containing `point`.
    ///
    /// Coordinates outside the `i32` range saturate; NaN maps to 0.
    pub fn cell_of(&self, point: P) -> CellKey {
        let mut key = [0; 3];
        for (axis, slot) in key.iter_mut().enumerate().take(P::DIM) {
            *slot = (point.axis(axis) * self.inv_cell_size).floor_to_cell();
        }
        key
    }

    /// Appends every element in the same cell as `point`.
    pub fn cell_query<'a, 'b, B>(&'a self, point: P, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        if let Some(bucket) = self.cells.get(&self.cell_of(point)) {
            push_bucket(bucket, buffer);
        }
        buffer
    }

    /// Appends every element in the cell containing `point` and its
    /// immediate neighbors (8 in 2D, 26 in 3D).
    pub fn neighbor_query<'a, 'b, B>(&'a self, point: P, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        let center = self.cell_of(point);
        let reach = |axis: usize| if axis < P::DIM { -1..=1 } else { 0..=0 };
        for dz in reach(2) {
            for dy in reach(1) {
                for dx in reach(0) {
                    let key = [
                        center[0].checked_add(dx),
                        center[1].checked_add(dy),
                        center[2].checked_add(dz),
                    ];
                    let [Some(x), Some(y), Some(z)] = key else {
                        continue;
                    };
                    if let Some(bucket) = self.cells.get(&[x, y, z]) {
                        push_bucket(bucket, buffer);
                    }
                }
            }
        }
        buffer
    }

    /// Appends every element within `radius` of `center` (boundary included).
    ///
    /// A negative or NaN radius matches nothing.
    pub fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        let sphere = Sphere::new(center, radius);
        if !sphere.is_valid() {
            return buffer;
        }
        self.collect_region(&sphere.bounding_box(), |p| sphere.contains_point(p), buffer)
    }

    /// Appends every element whose point lies inside `bounds` (faces included).
    pub fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        self.collect_region(bounds, |p| bounds.contains_point(p), buffer)
    }

    /// Tests the elements of every cell overlapping `region`, or of every
    /// occupied cell when that is the smaller set.
    fn collect_region<'a, 'b, B>(&'a self, region: &Aabb<P>, hit: impl Fn(P) -> bool, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        if region.is_empty() || self.cells.is_empty() {
            return buffer;
        }

        let lo = self.cell_of(region.min);
        let hi = self.cell_of(region.max);
        let spanned = (0..3).fold(1u64, |acc, axis| {
            acc.saturating_mul((i64::from(hi[axis]) - i64::from(lo[axis]) + 1) as u64)
        });

        if spanned > self.cells.len() as u64 {
            for bucket in self.cells.values() {
                push_hits(bucket, &hit, buffer);
            }
            return buffer;
        }

        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    if let Some(bucket) = self.cells.get(&[x, y, z]) {
                        push_hits(bucket, &hit, buffer);
                    }
                }
            }
        }
        buffer
    }
}

fn push_bucket<'a, T, P, B>(bucket: &'a [SpatialHashEntry<T, P>], buffer: &mut B)
where
    B: QueryBuffer<&'a T>,
{
    buffer.reserve_results(bucket.len());
    for entry in bucket {
        buffer.push_result(&entry.data);
    }
}

fn push_hits<'a, T, P: Copy, B>(bucket: &'a [SpatialHashEntry<T, P>], hit: &impl Fn(P) -> bool, buffer: &mut B)
where
    B: QueryBuffer<&'a T>,
{
    for entry in bucket {
        if hit(entry.position) {
            buffer.push_result(&entry.data);
        }
    }
}

impl<T, P: Point> SpatialQuery<P> for SpatialHash<T, P> {
    type Item = T;

    fn len(&self) -> usize {
        self.len
    }

    fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        SpatialHash::range_query(self, center, radius, buffer)
    }

    fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        SpatialHash::bounds_query(self, bounds, buffer)
    }
}
