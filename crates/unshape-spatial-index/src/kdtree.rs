use std::cmp::Ordering;

use glam::{Vec2, Vec3};
use smallvec::{SmallVec, smallvec};

use crate::aabb::Aabb;
use crate::buffer::QueryBuffer;
use crate::config::KdTreeMode;
use crate::point::{Point, Scalar};
use crate::query::{NearestNeighbors, SpatialQuery};

/// Sentinel for a missing child.
const NONE: usize = usize::MAX;

/// Traversal stack; balanced trees never outgrow the inline part.
type Stack<I> = SmallVec<[I; 32]>;

/// A point with associated data stored in a KD-tree.
#[derive(Debug, Clone)]
pub(crate) struct KdEntry<T, P> {
    pub position: P,
    pub data: T,
}

/// A node in the KD-tree arena.
///
/// Everything in `left` has `coord[axis] <= split`, everything in `right`
/// has `coord[axis] >= split`. Coordinates equal to `split` may sit on
/// either side.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KdNode<S> {
    /// Index into the entry list, which is also the construction index.
    entry: usize,
    axis: usize,
    split: S,
    left: usize,
    right: usize,
}

/// Candidate for k-nearest neighbor search.
///
/// Ordered by squared distance, then construction index, so ties evict
/// the later element.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KNearestCandidate<S> {
    pub distance_squared: S,
    pub entry: usize,
}

impl<S: Scalar> PartialEq for KNearestCandidate<S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S: Scalar> Eq for KNearestCandidate<S> {}

impl<S: Scalar> PartialOrd for KNearestCandidate<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: Scalar> Ord for KNearestCandidate<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_squared
            .total_cmp(&other.distance_squared)
            .then(self.entry.cmp(&other.entry))
    }
}

/// The best `count` candidates seen so far, sorted nearest first.
///
/// Stored inline up to 16 candidates, so typical queries do not allocate.
struct NearestCandidates<S> {
    count: usize,
    sorted: SmallVec<[KNearestCandidate<S>; 16]>,
}

impl<S: Scalar> NearestCandidates<S> {
    fn new(count: usize) -> Self {
        Self {
            count,
            sorted: SmallVec::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.sorted.len() >= self.count
    }

    fn worst(&self) -> Option<&KNearestCandidate<S>> {
        self.sorted.last()
    }

    fn offer(&mut self, candidate: KNearestCandidate<S>) {
        if self.is_full() && self.worst().is_some_and(|worst| candidate >= *worst) {
            return;
        }
        let at = self.sorted.partition_point(|existing| *existing < candidate);
        self.sorted.insert(at, candidate);
        self.sorted.truncate(self.count);
    }
}

/// Where a freshly built node hangs in the tree.
enum Link {
    Root,
    Left(usize),
    Right(usize),
}

struct BuildTask {
    start: usize,
    end: usize,
    depth: usize,
    link: Link,
}

/// A KD-tree over 2D or 3D points.
///
/// KD-trees partition space by alternating splits along each dimension
/// (axis = depth mod dimension), making them very efficient for nearest
/// neighbor searches in low dimensions. Every node holds one element; the
/// nodes live in a flat arena and are never modified after [`KdTree::build`].
///
/// Construction and traversal use explicit stacks, so even a degenerate
/// [`KdTreeMode::Unbalanced`] tree of depth `n` cannot overflow the call stack.
///
/// # Example
///
/// ```
/// use unshape_spatial_index::KdTree2D;
/// use glam::Vec2;
///
/// let points = vec![
///     (Vec2::new(10.0, 10.0), "A"),
///     (Vec2::new(20.0, 20.0), "B"),
///     (Vec2::new(50.0, 50.0), "C"),
/// ];
/// let tree = KdTree2D::build(points, |(position, _)| *position);
///
/// let (_, data, _) = tree.nearest(Vec2::new(12.0, 12.0)).unwrap();
/// assert_eq!(data.1, "A");
///
/// let mut hits = Vec::new();
/// tree.range_query(Vec2::new(15.0, 15.0), 8.0, &mut hits);
/// assert_eq!(hits.len(), 2);
/// ```
#[derive(Debug)]
pub struct KdTree<T, P: Point> {
    entries: Vec<KdEntry<T, P>>,
    nodes: Vec<KdNode<P::Scalar>>,
    root: usize,
    depth: usize,
    mode: KdTreeMode,
}

/// A 2D KD-tree.
pub type KdTree2D<T> = KdTree<T, Vec2>;

/// A 3D KD-tree.
pub type KdTree3D<T> = KdTree<T, Vec3>;

impl<T, P: Point> KdTree<T, P> {
    /// Builds a balanced KD-tree (median splits, `O(log n)` depth).
    ///
    /// `key_of` is called exactly once per element, in iteration order.
    pub fn build<I, F>(elements: I, key_of: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> P,
    {
        Self::build_with_mode(elements, key_of, KdTreeMode::Balanced)
    }

    /// Builds a KD-tree with the given split mode.
    pub fn build_with_mode<I, F>(elements: I, mut key_of: F, mode: KdTreeMode) -> Self
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> P,
    {
        let entries: Vec<KdEntry<T, P>> = elements
            .into_iter()
            .map(|data| KdEntry {
                position: key_of(&data),
                data,
            })
            .collect();

        let mut order: Vec<usize> = (0..entries.len()).collect();
        let mut nodes: Vec<KdNode<P::Scalar>> = Vec::with_capacity(entries.len());
        let mut scratch = Vec::new();
        let mut root = NONE;
        let mut depth = 0;

        let mut tasks = vec![BuildTask {
            start: 0,
            end: entries.len(),
            depth: 0,
            link: Link::Root,
        }];

        while let Some(task) = tasks.pop() {
            if task.start == task.end {
                continue;
            }

            let axis = task.depth % P::DIM;
            let slice = &mut order[task.start..task.end];
            let pivot = match mode {
                KdTreeMode::Balanced => split_median(slice, &entries, axis),
                KdTreeMode::Unbalanced => split_first(slice, &entries, axis, &mut scratch),
            };
            let entry = slice[pivot];

            let index = nodes.len();
            nodes.push(KdNode {
                entry,
                axis,
                split: entries[entry].position.axis(axis),
                left: NONE,
                right: NONE,
            });
            match task.link {
                Link::Root => root = index,
                Link::Left(parent) => nodes[parent].left = index,
                Link::Right(parent) => nodes[parent].right = index,
            }
            depth = depth.max(task.depth + 1);

            let mid = task.start + pivot;
            tasks.push(BuildTask {
                start: mid + 1,
                end: task.end,
                depth: task.depth + 1,
                link: Link::Right(index),
            });
            tasks.push(BuildTask {
                start: task.start,
                end: mid,
                depth: task.depth + 1,
                link: Link::Left(index),
            });
        }

        log::debug!(
            "built kd-tree: {} elements, depth {}, {:?} splits",
            entries.len(),
            depth,
            mode
        );

        Self {
            entries,
            nodes,
            root,
            depth,
            mode,
        }
    }

    /// Returns the number of points in the tree.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of levels on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The split mode the tree was built with.
    pub fn mode(&self) -> KdTreeMode {
        self.mode
    }

    /// Iterates over `(position, element)` pairs in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (P, &T)> {
        self.entries.iter().map(|e| (e.position, &e.data))
    }

    /// Appends every element within `radius` of `center`.
    ///
    /// The boundary is inclusive. A negative or NaN radius matches nothing.
    // Negated comparisons keep NaN splits descending both ways.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        if self.root == NONE || !(radius >= P::Scalar::ZERO) {
            return buffer;
        }
        let radius_squared = radius * radius;

        let mut stack: Stack<usize> = smallvec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let entry = &self.entries[node.entry];
            if entry.position.distance_squared(center) <= radius_squared {
                buffer.push_result(&entry.data);
            }

            let offset = center.axis(node.axis) - node.split;
            let straddles = !(offset * offset > radius_squared);
            if node.right != NONE && (offset >= P::Scalar::ZERO || straddles) {
                stack.push(node.right);
            }
            if node.left != NONE && (offset <= P::Scalar::ZERO || straddles) {
                stack.push(node.left);
            }
        }
        buffer
    }

    /// Appends every element whose point lies inside `bounds` (faces included).
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        if self.root == NONE || bounds.is_empty() {
            return buffer;
        }

        let mut stack: Stack<usize> = smallvec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let entry = &self.entries[node.entry];
            if bounds.contains_point(entry.position) {
                buffer.push_result(&entry.data);
            }

            if node.right != NONE && !(bounds.max.axis(node.axis) < node.split) {
                stack.push(node.right);
            }
            if node.left != NONE && !(bounds.min.axis(node.axis) > node.split) {
                stack.push(node.left);
            }
        }
        buffer
    }

    /// Appends up to `count` elements closest to `point`, nearest first.
    ///
    /// Elements at equal distance are ordered by construction index, and
    /// when the `count`-th place is tied the earlier element wins. The
    /// search is exact; "approximate" only refers to floating-point
    /// distance comparisons. Candidates are kept in a bounded scratch list
    /// that stays on the stack for `count <= 16`.
    pub fn approximate_nearest_neighbors<'a, 'b, B>(
        &'a self,
        point: P,
        count: usize,
        buffer: &'b mut B,
    ) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        if count == 0 || self.root == NONE {
            return buffer;
        }

        let mut candidates = NearestCandidates::new(count);
        self.collect_nearest(point, &mut candidates);

        buffer.reserve_results(candidates.sorted.len());
        for candidate in candidates.sorted {
            buffer.push_result(&self.entries[candidate.entry].data);
        }
        buffer
    }

    /// Finds the nearest point to the given position.
    ///
    /// Returns `(position, element, distance)`, or `None` if the tree is empty.
    pub fn nearest(&self, position: P) -> Option<(P, &T, P::Scalar)> {
        if self.root == NONE {
            return None;
        }
        let mut candidates = NearestCandidates::new(1);
        self.collect_nearest(position, &mut candidates);
        candidates.sorted.first().map(|candidate| {
            let entry = &self.entries[candidate.entry];
            (entry.position, &entry.data, candidate.distance_squared.sqrt())
        })
    }

    fn collect_nearest(&self, point: P, candidates: &mut NearestCandidates<P::Scalar>) {
        // Each stack item carries a lower bound on the squared distance to
        // anything in that subtree.
        let mut stack: Stack<(usize, P::Scalar)> = smallvec![(self.root, P::Scalar::ZERO)];
        while let Some((index, bound)) = stack.pop() {
            if candidates.is_full() && candidates.worst().is_some_and(|worst| bound > worst.distance_squared) {
                continue;
            }

            let node = &self.nodes[index];
            let candidate = KNearestCandidate {
                distance_squared: self.entries[node.entry].position.distance_squared(point),
                entry: node.entry,
            };
            candidates.offer(candidate);

            let offset = point.axis(node.axis) - node.split;
            let (near, far) = if offset < P::Scalar::ZERO {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };
            if far != NONE {
                stack.push((far, bound.max(offset * offset)));
            }
            if near != NONE {
                stack.push((near, bound));
            }
        }
    }
}

/// Orders `slice` so its median (by coordinate, then construction index)
/// sits at the middle, and returns that position.
fn split_median<T, P: Point>(slice: &mut [usize], entries: &[KdEntry<T, P>], axis: usize) -> usize {
    let mid = slice.len() / 2;
    slice.select_nth_unstable_by(mid, |&a, &b| {
        entries[a]
            .position
            .axis(axis)
            .total_cmp(&entries[b].position.axis(axis))
            .then(a.cmp(&b))
    });
    mid
}

/// Uses the first element of `slice` as the pivot and stably partitions the
/// rest around it. Returns the pivot's new position.
fn split_first<T, P: Point>(
    slice: &mut [usize],
    entries: &[KdEntry<T, P>],
    axis: usize,
    scratch: &mut Vec<usize>,
) -> usize {
    let pivot = slice[0];
    let split = entries[pivot].position.axis(axis);
    let is_less =
        |index: usize| entries[index].position.axis(axis).total_cmp(&split) == Ordering::Less;
    let rest = &slice[1..];

    if rest
        .iter()
        .all(|&index| entries[index].position.axis(axis).total_cmp(&split) == Ordering::Equal)
    {
        // All tied with the pivot: any cut satisfies the split invariant,
        // so cut in the middle instead of building a chain.
        return slice.len() / 2;
    }

    scratch.clear();
    scratch.extend(rest.iter().copied().filter(|&index| is_less(index)));
    let left = scratch.len();
    scratch.push(pivot);
    scratch.extend(rest.iter().copied().filter(|&index| !is_less(index)));
    slice.copy_from_slice(scratch);
    left
}

impl<T, P: Point> SpatialQuery<P> for KdTree<T, P> {
    type Item = T;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        KdTree::range_query(self, center, radius, buffer)
    }

    fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        KdTree::bounds_query(self, bounds, buffer)
    }
}

impl<T, P: Point> NearestNeighbors<P> for KdTree<T, P> {
    fn approximate_nearest_neighbors<'a, 'b, B>(
        &'a self,
        point: P,
        count: usize,
        buffer: &'b mut B,
    ) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        KdTree::approximate_nearest_neighbors(self, point, count, buffer)
    }
}
