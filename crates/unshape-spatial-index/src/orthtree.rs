use glam::{Vec2, Vec3};
use smallvec::{SmallVec, smallvec};

use crate::SpatialError;
use crate::aabb::Aabb;
use crate::buffer::QueryBuffer;
use crate::config::OrthtreeConfig;
use crate::point::{Point, Scalar};
use crate::query::SpatialQuery;
use crate::sphere::Sphere;

/// Sentinel for a leaf's missing children.
const NONE: usize = usize::MAX;

/// A point with associated data stored in an orthtree.
#[derive(Debug, Clone)]
pub(crate) struct OrthtreeEntry<T, P> {
    pub position: P,
    pub data: T,
}

/// A node in the orthtree arena.
///
/// `start..end` is the node's slice of the entry list; an internal node's
/// range is the concatenation of its children's. The `2^DIM` children of an
/// internal node are stored contiguously from `first_child`, in
/// [`Aabb::child_bounds`] order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrthtreeNode<P> {
    bounds: Aabb<P>,
    start: usize,
    end: usize,
    first_child: usize,
}

impl<P> OrthtreeNode<P> {
    fn is_leaf(&self) -> bool {
        self.first_child == NONE
    }

    fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A quadtree (2D) or octree (3D) built over a point set.
///
/// Each node covers a box; a node holding more than
/// [`OrthtreeConfig::capacity`] elements splits at its center into `2^DIM`
/// equal children, down to [`OrthtreeConfig::max_depth`]. Leaves at the depth
/// cap keep everything that lands in them, so many coincident points make one
/// oversized leaf rather than an endless subdivision.
///
/// Elements whose position has a NaN or infinite coordinate are kept outside
/// the hierarchy and tested one by one.
///
/// # Example
///
/// ```
/// use unshape_spatial_index::{Aabb2, OrthtreeConfig, Quadtree};
/// use glam::Vec2;
///
/// let points = vec![
///     (Vec2::new(10.0, 20.0), 1),
///     (Vec2::new(50.0, 50.0), 2),
/// ];
/// let tree = Quadtree::build(points, |(position, _)| *position, OrthtreeConfig::default())?;
///
/// let mut hits = Vec::new();
/// tree.bounds_query(&Aabb2::new(Vec2::ZERO, Vec2::splat(30.0)), &mut hits);
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].1, 1);
/// # Ok::<(), unshape_spatial_index::SpatialError>(())
/// ```
#[derive(Debug)]
pub struct Orthtree<T, P: Point> {
    entries: Vec<OrthtreeEntry<T, P>>,
    nodes: Vec<OrthtreeNode<P>>,
    /// Entries from here on have non-finite positions.
    indexed: usize,
    depth: usize,
    config: OrthtreeConfig<P>,
}

/// A quadtree for 2D spatial partitioning.
pub type Quadtree<T> = Orthtree<T, Vec2>;

/// An octree for 3D spatial partitioning.
pub type Octree<T> = Orthtree<T, Vec3>;

fn is_finite<P: Point>(point: P) -> bool {
    (0..P::DIM).all(|axis| point.axis(axis).is_finite())
}

impl<T, P: Point> Orthtree<T, P> {
    const FANOUT: usize = 1 << P::DIM;

    /// Builds the tree.
    ///
    /// `key_of` is called exactly once per element, in iteration order.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`OrthtreeConfig::validate`].
    pub fn build<I, F>(elements: I, mut key_of: F, config: OrthtreeConfig<P>) -> Result<Self, SpatialError>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> P,
    {
        config.validate()?;

        let entries: Vec<OrthtreeEntry<T, P>> = elements
            .into_iter()
            .map(|data| OrthtreeEntry {
                position: key_of(&data),
                data,
            })
            .collect();

        let mut order: Vec<usize> = (0..entries.len())
            .filter(|&i| is_finite(entries[i].position))
            .collect();
        let indexed = order.len();
        order.extend((0..entries.len()).filter(|&i| !is_finite(entries[i].position)));

        let mut bounds = Aabb::from_points(order[..indexed].iter().map(|&i| entries[i].position));
        if let Some(extra) = config
            .bounds
            .filter(|b| !b.is_empty() && is_finite(b.min) && is_finite(b.max))
        {
            bounds = bounds.union(&extra);
        }

        let mut nodes = vec![OrthtreeNode {
            bounds,
            start: 0,
            end: indexed,
            first_child: NONE,
        }];
        let mut depth = 0;
        let mut overfull = 0;
        let mut codes = Vec::new();
        let mut scratch = Vec::new();

        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, level)) = stack.pop() {
            depth = depth.max(level);
            let OrthtreeNode {
                bounds, start, end, ..
            } = nodes[index];
            let count = end - start;
            if count <= config.capacity {
                continue;
            }
            if level >= config.max_depth {
                overfull += 1;
                continue;
            }

            // Counting sort of the node's slice by child orthant.
            codes.clear();
            codes.extend(
                order[start..end]
                    .iter()
                    .map(|&i| bounds.child_index(entries[i].position)),
            );
            let mut offsets = [0usize; 9];
            for &code in &codes {
                offsets[code + 1] += 1;
            }
            for child in 0..Self::FANOUT {
                offsets[child + 1] += offsets[child];
            }
            let mut cursor = offsets;
            scratch.clear();
            scratch.resize(count, 0);
            for (k, &code) in codes.iter().enumerate() {
                scratch[cursor[code]] = order[start + k];
                cursor[code] += 1;
            }
            order[start..end].copy_from_slice(&scratch);

            let first_child = nodes.len();
            nodes[index].first_child = first_child;
            for child in 0..Self::FANOUT {
                nodes.push(OrthtreeNode {
                    bounds: bounds.child_bounds(child),
                    start: start + offsets[child],
                    end: start + offsets[child + 1],
                    first_child: NONE,
                });
            }
            for child in (0..Self::FANOUT).rev() {
                stack.push((first_child + child, level + 1));
            }
        }

        if overfull > 0 {
            log::debug!(
                "orthtree: {overfull} leaves at max depth {} exceed capacity {}",
                config.max_depth,
                config.capacity
            );
        }

        let mut slots: Vec<Option<OrthtreeEntry<T, P>>> = entries.into_iter().map(Some).collect();
        let entries: Vec<OrthtreeEntry<T, P>> = order.iter().filter_map(|&i| slots[i].take()).collect();

        log::debug!(
            "built orthtree: {} elements, {} nodes, depth {}, {} unindexed",
            entries.len(),
            nodes.len(),
            depth,
            entries.len() - indexed
        );

        Ok(Self {
            entries,
            nodes,
            indexed,
            depth,
            config,
        })
    }

    /// Returns the root bounds.
    ///
    /// This is the tight box of the indexed points, grown to
    /// [`OrthtreeConfig::bounds`] when given. Empty when nothing is indexed.
    pub fn bounds(&self) -> Aabb<P> {
        self.nodes[0].bounds
    }

    /// Returns the configuration the tree was built with.
    pub fn config(&self) -> &OrthtreeConfig<P> {
        &self.config
    }

    /// Returns the number of points in the tree.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deepest subdivision level; 0 when the root is a leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaf nodes, including empty ones.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Iterates over `(position, element)` pairs in tree order.
    pub fn iter(&self) -> impl Iterator<Item = (P, &T)> {
        self.entries.iter().map(|e| (e.position, &e.data))
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

        let mut stack: SmallVec<[usize; 32]> = smallvec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.is_empty() || !sphere.intersects_aabb(&node.bounds) {
                continue;
            }
            if node.is_leaf() {
                for entry in &self.entries[node.start..node.end] {
                    if sphere.contains_point(entry.position) {
                        buffer.push_result(&entry.data);
                    }
                }
            } else {
                stack.extend((0..Self::FANOUT).rev().map(|child| node.first_child + child));
            }
        }

        self.scan_unindexed(|position| sphere.contains_point(position), buffer)
    }

    /// Appends every element whose point lies inside `bounds` (faces included).
    ///
    /// Nodes entirely inside `bounds` are appended without testing their elements.
    pub fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        if bounds.is_empty() {
            return buffer;
        }

        let mut stack: SmallVec<[usize; 32]> = smallvec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.is_empty() || !bounds.intersects(&node.bounds) {
                continue;
            }
            if bounds.contains_aabb(&node.bounds) {
                let entries = &self.entries[node.start..node.end];
                buffer.reserve_results(entries.len());
                for entry in entries {
                    buffer.push_result(&entry.data);
                }
            } else if node.is_leaf() {
                for entry in &self.entries[node.start..node.end] {
                    if bounds.contains_point(entry.position) {
                        buffer.push_result(&entry.data);
                    }
                }
            } else {
                stack.extend((0..Self::FANOUT).rev().map(|child| node.first_child + child));
            }
        }

        self.scan_unindexed(|position| bounds.contains_point(position), buffer)
    }

    fn scan_unindexed<'a, 'b, B>(&'a self, mut hit: impl FnMut(P) -> bool, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        for entry in &self.entries[self.indexed..] {
            if hit(entry.position) {
                buffer.push_result(&entry.data);
            }
        }
        buffer
    }
}

impl<T, P: Point> SpatialQuery<P> for Orthtree<T, P> {
    type Item = T;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        Orthtree::range_query(self, center, radius, buffer)
    }

    fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        Orthtree::bounds_query(self, bounds, buffer)
    }
}
