use crate::aabb::Aabb;
use crate::buffer::QueryBuffer;
use crate::point::Point;

/// Region queries shared by every index in the crate.
///
/// The concrete structure is chosen at construction time; this trait lets
/// code that only queries stay generic over it. Implementations append
/// `&Item` references to the caller's buffer and return that buffer.
pub trait SpatialQuery<P: Point> {
    /// The element type stored in the index.
    type Item;

    /// Number of indexed elements.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends every element within `radius` of `center` (boundary included).
    fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>;

    /// Appends every element inside or touching `bounds`.
    fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>;
}

/// k-nearest-neighbor search.
pub trait NearestNeighbors<P: Point>: SpatialQuery<P> {
    /// Appends up to `count` elements closest to `point`, nearest first.
    fn approximate_nearest_neighbors<'a, 'b, B>(
        &'a self,
        point: P,
        count: usize,
        buffer: &'b mut B,
    ) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>;
}
