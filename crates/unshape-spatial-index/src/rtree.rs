use std::collections::VecDeque;

use glam::{Vec2, Vec3};
use smallvec::{SmallVec, smallvec};

use crate::SpatialError;
use crate::aabb::Aabb;
use crate::buffer::QueryBuffer;
use crate::config::{RTreeConfig, RTreeStrategy};
use crate::point::{Point, Scalar};
use crate::query::SpatialQuery;
use crate::segment::Segment;
use crate::sphere::Sphere;

/// Sentinel for the root of an empty tree.
const NONE: usize = usize::MAX;

/// An entry in the R-tree (a box with associated data).
#[derive(Debug, Clone)]
pub(crate) struct RTreeEntry<T, P> {
    pub bounds: Aabb<P>,
    pub data: T,
}

/// A node in the R-tree arena.
///
/// For a leaf, `start..end` indexes the entry list; otherwise it indexes the
/// node arena, where the children sit next to each other. `bounds` is the
/// tight union of whatever the range covers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RTreeNode<P> {
    bounds: Aabb<P>,
    start: usize,
    end: usize,
    leaf: bool,
}

/// An R-tree over 2D or 3D boxes.
///
/// R-trees are balanced search trees that organize spatial data by grouping
/// nearby objects in minimum bounding boxes. Sibling boxes may overlap, so
/// a query can descend into several children. Unlike the point trees, the
/// elements here have extent: a query matches an element when it touches
/// the element's box.
///
/// # Example
///
/// ```
/// use unshape_spatial_index::{Aabb2, RTree2D, RTreeConfig};
/// use glam::Vec2;
///
/// let rects = vec![
///     (Aabb2::new(Vec2::ZERO, Vec2::splat(10.0)), "rect1"),
///     (Aabb2::new(Vec2::splat(20.0), Vec2::splat(30.0)), "rect2"),
/// ];
/// let tree = RTree2D::build(rects, |(bounds, _)| *bounds, RTreeConfig::new(4))?;
///
/// let mut hits = Vec::new();
/// tree.bounds_query(&Aabb2::new(Vec2::splat(5.0), Vec2::splat(15.0)), &mut hits);
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].1, "rect1");
/// # Ok::<(), unshape_spatial_index::SpatialError>(())
/// ```
#[derive(Debug)]
pub struct RTree<T, P: Point> {
    entries: Vec<RTreeEntry<T, P>>,
    nodes: Vec<RTreeNode<P>>,
    root: usize,
    depth: usize,
    config: RTreeConfig,
}

/// A 2D R-tree.
pub type RTree2D<T> = RTree<T, Vec2>;

/// A 3D R-tree.
pub type RTree3D<T> = RTree<T, Vec3>;

impl<T, P: Point> RTree<T, P> {
    /// Builds the tree with the grouping heuristic named by `config.strategy`.
    ///
    /// `key_of` is called exactly once per element, in iteration order.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`RTreeConfig::validate`].
    pub fn build<I, F>(elements: I, mut key_of: F, config: RTreeConfig) -> Result<Self, SpatialError>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> Aabb<P>,
    {
        config.validate()?;

        let entries: Vec<RTreeEntry<T, P>> = elements
            .into_iter()
            .map(|data| RTreeEntry {
                bounds: key_of(&data),
                data,
            })
            .collect();
        let boxes: Vec<Aabb<P>> = entries.iter().map(|e| e.bounds).collect();

        let layout = match config.strategy {
            RTreeStrategy::SortTileRecursive => pack_str(&boxes, config.node_capacity),
            RTreeStrategy::QuadraticInsert => QuadraticBuilder::new(&boxes, config.node_capacity).build(),
        };

        let mut slots: Vec<Option<RTreeEntry<T, P>>> = entries.into_iter().map(Some).collect();
        let entries: Vec<RTreeEntry<T, P>> = layout
            .order
            .iter()
            .filter_map(|&i| slots[i].take())
            .collect();

        log::debug!(
            "built r-tree: {} elements, {} nodes, depth {}, {:?}",
            entries.len(),
            layout.nodes.len(),
            layout.depth,
            config.strategy
        );

        Ok(Self {
            entries,
            nodes: layout.nodes,
            root: layout.root,
            depth: layout.depth,
            config,
        })
    }

    /// Returns the union of every element box; empty for an empty tree.
    pub fn bounds(&self) -> Aabb<P> {
        if self.root == NONE {
            Aabb::empty()
        } else {
            self.nodes[self.root].bounds
        }
    }

    /// Returns the configuration the tree was built with.
    pub fn config(&self) -> &RTreeConfig {
        &self.config
    }

    /// Returns the number of entries in the R-tree.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the R-tree is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of levels, leaves included; 0 for an empty tree.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Iterates over `(bounds, element)` pairs in tree order.
    pub fn iter(&self) -> impl Iterator<Item = (Aabb<P>, &T)> {
        self.entries.iter().map(|e| (e.bounds, &e.data))
    }

    /// Appends every element whose box intersects `bounds` (touching counts).
    pub fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        self.collect(|b| b.intersects(bounds), buffer)
    }

    /// Appends every element whose box is within `radius` of `center`.
    ///
    /// An element matches when the closest point of its box lies within
    /// the sphere (boundary included). A negative or NaN radius matches nothing.
    pub fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        let sphere = Sphere::new(center, radius);
        self.collect(|b| sphere.intersects_aabb(b), buffer)
    }

    /// Appends every element whose box contains `point`.
    pub fn point_query<'a, 'b, B>(&'a self, point: P, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        self.collect(|b| b.contains_point(point), buffer)
    }

    /// Appends every element whose box is crossed by `segment`.
    pub fn segment_query<'a, 'b, B>(&'a self, segment: &Segment<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        self.collect(|b| segment.intersects_aabb(b), buffer)
    }

    /// Depth-first traversal pruning every node whose bounds fail `overlaps`,
    /// appending the elements whose boxes pass it.
    fn collect<'a, 'b, B>(&'a self, overlaps: impl Fn(&Aabb<P>) -> bool, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a T>,
    {
        if self.root == NONE {
            return buffer;
        }

        let mut stack: SmallVec<[usize; 32]> = smallvec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !overlaps(&node.bounds) {
                continue;
            }
            if node.leaf {
                for entry in &self.entries[node.start..node.end] {
                    if overlaps(&entry.bounds) {
                        buffer.push_result(&entry.data);
                    }
                }
            } else {
                stack.extend((node.start..node.end).rev());
            }
        }
        buffer
    }
}

impl<T, P: Point> SpatialQuery<P> for RTree<T, P> {
    type Item = T;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn range_query<'a, 'b, B>(&'a self, center: P, radius: P::Scalar, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        RTree::range_query(self, center, radius, buffer)
    }

    fn bounds_query<'a, 'b, B>(&'a self, bounds: &Aabb<P>, buffer: &'b mut B) -> &'b mut B
    where
        B: QueryBuffer<&'a Self::Item>,
    {
        RTree::bounds_query(self, bounds, buffer)
    }
}

/// Arena produced by either construction strategy.
struct Layout<P> {
    /// Entry permutation: leaf ranges index into `order`.
    order: Vec<usize>,
    nodes: Vec<RTreeNode<P>>,
    root: usize,
    depth: usize,
}

fn union_all<P: Point>(boxes: impl Iterator<Item = Aabb<P>>) -> Aabb<P> {
    boxes.fold(Aabb::empty(), |acc, b| acc.union(&b))
}

/// Extra volume `base` needs to also cover `other`.
fn enlargement<P: Point>(base: &Aabb<P>, other: &Aabb<P>) -> P::Scalar {
    base.union(other).volume() - base.volume()
}

// Sort-tile-recursive packing

/// Packs `boxes` bottom-up: leaves first, then each parent level from the
/// level below, until a single root remains.
fn pack_str<P: Point>(boxes: &[Aabb<P>], capacity: usize) -> Layout<P> {
    if boxes.is_empty() {
        return Layout {
            order: Vec::new(),
            nodes: Vec::new(),
            root: NONE,
            depth: 0,
        };
    }

    let mut order: Vec<usize> = (0..boxes.len()).collect();
    let centers: Vec<P> = boxes.iter().map(Aabb::center).collect();
    let mut groups = Vec::new();
    str_tile(&mut order, &centers, capacity, 0, 0, &mut groups);

    let mut level: Vec<RTreeNode<P>> = groups
        .iter()
        .map(|&(start, end)| RTreeNode {
            bounds: union_all(order[start..end].iter().map(|&i| boxes[i])),
            start,
            end,
            leaf: true,
        })
        .collect();

    let mut nodes = Vec::new();
    let mut depth = usize::from(!level.is_empty());
    while level.len() > 1 {
        let centers: Vec<P> = level.iter().map(|node| node.bounds.center()).collect();
        let mut tiled: Vec<usize> = (0..level.len()).collect();
        groups.clear();
        str_tile(&mut tiled, &centers, capacity, 0, 0, &mut groups);

        let base = nodes.len();
        nodes.extend(tiled.iter().map(|&i| level[i]));
        level = groups
            .iter()
            .map(|&(start, end)| RTreeNode {
                bounds: union_all(nodes[base + start..base + end].iter().map(|node| node.bounds)),
                start: base + start,
                end: base + end,
                leaf: false,
            })
            .collect();
        depth += 1;
    }
    nodes.extend(level);

    let root = if nodes.is_empty() { NONE } else { nodes.len() - 1 };
    Layout {
        order,
        nodes,
        root,
        depth,
    }
}

/// Sorts `items` along `axis` by center (ties by index), cuts it into slabs
/// and tiles each slab along the next axis. The last axis is cut into runs
/// of `capacity`, recorded in `groups` as ranges offset by `offset`.
fn str_tile<P: Point>(
    items: &mut [usize],
    centers: &[P],
    capacity: usize,
    axis: usize,
    offset: usize,
    groups: &mut Vec<(usize, usize)>,
) {
    items.sort_unstable_by(|&a, &b| {
        centers[a]
            .axis(axis)
            .total_cmp(&centers[b].axis(axis))
            .then(a.cmp(&b))
    });

    if axis + 1 == P::DIM {
        for start in (0..items.len()).step_by(capacity) {
            groups.push((offset + start, offset + (start + capacity).min(items.len())));
        }
        return;
    }

    if items.is_empty() {
        return;
    }
    let pages = items.len().div_ceil(capacity);
    let slabs = slab_count(pages, P::DIM - axis);
    let slab_size = capacity * pages.div_ceil(slabs);
    for (k, slab) in items.chunks_mut(slab_size).enumerate() {
        str_tile(slab, centers, capacity, axis + 1, offset + k * slab_size, groups);
    }
}

/// Smallest `s` with `s^dims >= pages`.
fn slab_count(pages: usize, dims: usize) -> usize {
    let exp = dims as u32;
    let mut s = ((pages as f64).powf(1.0 / dims as f64).ceil() as usize).max(1);
    while s.saturating_pow(exp) < pages {
        s += 1;
    }
    while s > 1 && (s - 1).saturating_pow(exp) >= pages {
        s -= 1;
    }
    s
}

// Quadratic insertion

/// Construction-time tree for one-by-one insertion.
enum InsertNode<P> {
    Leaf { bounds: Aabb<P>, items: Vec<usize> },
    Internal { bounds: Aabb<P>, children: Vec<InsertNode<P>> },
}

impl<P: Point> InsertNode<P> {
    fn bounds(&self) -> Aabb<P> {
        match self {
            InsertNode::Leaf { bounds, .. } => *bounds,
            InsertNode::Internal { bounds, .. } => *bounds,
        }
    }
}

struct QuadraticBuilder<'a, P> {
    boxes: &'a [Aabb<P>],
    capacity: usize,
    /// Smallest group a split may produce.
    min_fill: usize,
}

impl<'a, P: Point> QuadraticBuilder<'a, P> {
    fn new(boxes: &'a [Aabb<P>], capacity: usize) -> Self {
        Self {
            boxes,
            capacity,
            min_fill: (capacity * 2 / 5).max(1),
        }
    }

    fn build(self) -> Layout<P> {
        if self.boxes.is_empty() {
            return Layout {
                order: Vec::new(),
                nodes: Vec::new(),
                root: NONE,
                depth: 0,
            };
        }

        let mut root = InsertNode::Leaf {
            bounds: Aabb::empty(),
            items: Vec::new(),
        };
        for item in 0..self.boxes.len() {
            if let Some(sibling) = self.insert(&mut root, item) {
                let old = std::mem::replace(
                    &mut root,
                    InsertNode::Leaf {
                        bounds: Aabb::empty(),
                        items: Vec::new(),
                    },
                );
                root = InsertNode::Internal {
                    bounds: old.bounds().union(&sibling.bounds()),
                    children: vec![old, sibling],
                };
            }
        }

        flatten(root, self.boxes.len())
    }

    /// Inserts `item` below `node`. When `node` overflows it keeps one half
    /// of the split and the other half is returned for the caller to adopt.
    fn insert(&self, node: &mut InsertNode<P>, item: usize) -> Option<InsertNode<P>> {
        let item_bounds = self.boxes[item];
        match node {
            InsertNode::Leaf { bounds, items } => {
                *bounds = bounds.union(&item_bounds);
                items.push(item);
                if items.len() <= self.capacity {
                    return None;
                }
                let ((left_bounds, left), (right_bounds, right)) =
                    self.quadratic_split(std::mem::take(items), |&i| self.boxes[i]);
                *node = InsertNode::Leaf {
                    bounds: left_bounds,
                    items: left,
                };
                Some(InsertNode::Leaf {
                    bounds: right_bounds,
                    items: right,
                })
            }
            InsertNode::Internal { bounds, children } => {
                *bounds = bounds.union(&item_bounds);
                let best = self.choose_subtree(children, &item_bounds);
                let sibling = self.insert(&mut children[best], item)?;
                children.insert(best + 1, sibling);
                if children.len() <= self.capacity {
                    return None;
                }
                let ((left_bounds, left), (right_bounds, right)) =
                    self.quadratic_split(std::mem::take(children), InsertNode::bounds);
                *node = InsertNode::Internal {
                    bounds: left_bounds,
                    children: left,
                };
                Some(InsertNode::Internal {
                    bounds: right_bounds,
                    children: right,
                })
            }
        }
    }

    /// Child needing the least volume enlargement; the first one wins ties.
    fn choose_subtree(&self, children: &[InsertNode<P>], bounds: &Aabb<P>) -> usize {
        let mut best = 0;
        let mut best_cost = P::Scalar::INFINITY;
        for (i, child) in children.iter().enumerate() {
            let cost = enlargement(&child.bounds(), bounds);
            if cost < best_cost {
                best = i;
                best_cost = cost;
            }
        }
        best
    }

    /// Guttman's quadratic split into two groups of at least `min_fill`.
    #[allow(clippy::type_complexity)]
    fn quadratic_split<I>(
        &self,
        mut items: Vec<I>,
        bounds_of: impl Fn(&I) -> Aabb<P>,
    ) -> ((Aabb<P>, Vec<I>), (Aabb<P>, Vec<I>)) {
        let (seed_a, seed_b) = pick_seeds(&items, &bounds_of);
        let second = items.remove(seed_b);
        let first = items.remove(seed_a);

        let mut left = (bounds_of(&first), vec![first]);
        let mut right = (bounds_of(&second), vec![second]);

        while !items.is_empty() {
            // A group that needs everything left to reach the minimum takes it.
            if left.1.len() + items.len() <= self.min_fill {
                for item in items.drain(..) {
                    left.0 = left.0.union(&bounds_of(&item));
                    left.1.push(item);
                }
                break;
            }
            if right.1.len() + items.len() <= self.min_fill {
                for item in items.drain(..) {
                    right.0 = right.0.union(&bounds_of(&item));
                    right.1.push(item);
                }
                break;
            }

            // Pick the item with the strongest preference for one group.
            let mut pick = 0;
            let mut pick_costs = (P::Scalar::ZERO, P::Scalar::ZERO);
            let mut pick_preference = P::Scalar::NEG_INFINITY;
            for (i, item) in items.iter().enumerate() {
                let b = bounds_of(item);
                let costs = (enlargement(&left.0, &b), enlargement(&right.0, &b));
                let preference = (costs.0 - costs.1).abs();
                if preference > pick_preference {
                    pick = i;
                    pick_costs = costs;
                    pick_preference = preference;
                }
            }

            let item = items.remove(pick);
            let (cost_left, cost_right) = pick_costs;
            let to_left = if cost_left != cost_right {
                cost_left < cost_right
            } else if left.0.volume() != right.0.volume() {
                left.0.volume() < right.0.volume()
            } else {
                left.1.len() <= right.1.len()
            };
            let group = if to_left { &mut left } else { &mut right };
            group.0 = group.0.union(&bounds_of(&item));
            group.1.push(item);
        }

        (left, right)
    }
}

/// The pair of items that would waste the most volume if grouped together.
fn pick_seeds<I, P: Point>(items: &[I], bounds_of: impl Fn(&I) -> Aabb<P>) -> (usize, usize) {
    let mut max_waste = P::Scalar::NEG_INFINITY;
    let mut seeds = (0, 1);

    for i in 0..items.len() {
        let a = bounds_of(&items[i]);
        for j in (i + 1)..items.len() {
            let b = bounds_of(&items[j]);
            let waste = a.union(&b).volume() - a.volume() - b.volume();
            if waste > max_waste {
                max_waste = waste;
                seeds = (i, j);
            }
        }
    }

    seeds
}

/// Lays the construction tree out breadth-first so siblings are adjacent.
fn flatten<P: Point>(root: InsertNode<P>, len: usize) -> Layout<P> {
    let placeholder = RTreeNode {
        bounds: Aabb::empty(),
        start: 0,
        end: 0,
        leaf: true,
    };
    let mut order = Vec::with_capacity(len);
    let mut nodes = vec![placeholder];
    let mut depth = 0;
    let mut queue = VecDeque::from([(root, 0usize, 1usize)]);

    while let Some((node, index, level)) = queue.pop_front() {
        depth = depth.max(level);
        let built = match node {
            InsertNode::Leaf { bounds, items } => {
                let start = order.len();
                order.extend(items);
                RTreeNode {
                    bounds,
                    start,
                    end: order.len(),
                    leaf: true,
                }
            }
            InsertNode::Internal { bounds, children } => {
                let start = nodes.len();
                for child in children {
                    nodes.push(placeholder);
                    queue.push_back((child, nodes.len() - 1, level + 1));
                }
                RTreeNode {
                    bounds,
                    start,
                    end: nodes.len(),
                    leaf: false,
                }
            }
        };
        nodes[index] = built;
    }

    Layout {
        order,
        nodes,
        root: 0,
        depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aabb::{Aabb2, Aabb3};

    const STRATEGIES: [RTreeStrategy; 2] = [RTreeStrategy::SortTileRecursive, RTreeStrategy::QuadraticInsert];

    fn build<T>(rects: Vec<(Aabb2, T)>, capacity: usize, strategy: RTreeStrategy) -> RTree2D<(Aabb2, T)> {
        RTree2D::build(
            rects,
            |(bounds, _)| *bounds,
            RTreeConfig::new(capacity).with_strategy(strategy),
        )
        .unwrap()
    }

    fn grid(count: usize) -> Vec<(Aabb2, usize)> {
        (0..count)
            .map(|i| {
                let min = Vec2::new((i % 17) as f32 * 3.0, (i / 17) as f32 * 2.0);
                (Aabb2::new(min, min + Vec2::new(2.5, 1.0 + (i % 3) as f32)), i)
            })
            .collect()
    }

    /// Checks capacity, tight bounds and contiguous leaf coverage.
    fn assert_well_formed<T>(tree: &RTree2D<T>) {
        let mut covered = vec![false; tree.len()];
        for node in &tree.nodes {
            let count = node.end - node.start;
            assert!(count >= 1 && count <= tree.config.node_capacity);
            let tight = if node.leaf {
                for flag in &mut covered[node.start..node.end] {
                    assert!(!*flag);
                    *flag = true;
                }
                union_all(tree.entries[node.start..node.end].iter().map(|e| e.bounds))
            } else {
                union_all(tree.nodes[node.start..node.end].iter().map(|n| n.bounds))
            };
            assert_eq!(node.bounds, tight);
        }
        assert!(covered.iter().all(|flag| *flag));
    }

    #[test]
    fn test_rtree_empty() {
        for strategy in STRATEGIES {
            let tree: RTree2D<(Aabb2, i32)> = build(vec![], 4, strategy);
            assert!(tree.is_empty());
            assert_eq!(tree.len(), 0);
            assert_eq!(tree.depth(), 0);
            assert!(tree.bounds().is_empty());

            let mut results = Vec::new();
            tree.bounds_query(&Aabb2::new(Vec2::splat(-1e6), Vec2::splat(1e6)), &mut results);
            tree.point_query(Vec2::ZERO, &mut results);
            assert!(results.is_empty());
        }
    }

    #[test]
    fn test_rtree_default_config_accepts_empty_input() {
        let tree = RTree2D::build(Vec::<Aabb2>::new(), |b| *b, RTreeConfig::default()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);

        let mut results = Vec::new();
        tree.range_query(Vec2::ZERO, 1e6, &mut results);
        tree.segment_query(&Segment::new(Vec2::splat(-1.0), Vec2::splat(1.0)), &mut results);
        assert!(results.is_empty());

        let mut groups = Vec::new();
        str_tile::<Vec2>(&mut [], &[], 4, 0, 0, &mut groups);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_rtree_single() {
        for strategy in STRATEGIES {
            let tree = build(vec![(Aabb2::new(Vec2::ZERO, Vec2::splat(10.0)), "rect")], 4, strategy);
            assert_eq!(tree.len(), 1);
            assert_eq!(tree.depth(), 1);
            assert_eq!(tree.bounds(), Aabb2::new(Vec2::ZERO, Vec2::splat(10.0)));
        }
    }

    #[test]
    fn test_rtree_query() {
        for strategy in STRATEGIES {
            let tree = build(
                vec![
                    (Aabb2::new(Vec2::ZERO, Vec2::splat(10.0)), "rect1"),
                    (Aabb2::new(Vec2::splat(20.0), Vec2::splat(30.0)), "rect2"),
                    (Aabb2::new(Vec2::splat(50.0), Vec2::splat(60.0)), "rect3"),
                ],
                4,
                strategy,
            );
            assert_eq!(tree.len(), 3);

            // Overlapping rect1
            let mut results = Vec::new();
            tree.bounds_query(&Aabb2::new(Vec2::splat(5.0), Vec2::splat(15.0)), &mut results);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].1, "rect1");

            // Overlapping rect2
            let mut results = Vec::new();
            tree.bounds_query(&Aabb2::new(Vec2::splat(25.0), Vec2::splat(35.0)), &mut results);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].1, "rect2");

            // Touching rect3 at its corner
            let mut results = Vec::new();
            tree.bounds_query(&Aabb2::new(Vec2::splat(60.0), Vec2::splat(70.0)), &mut results);
            assert_eq!(results.len(), 1);

            // Not overlapping anything
            let mut results = Vec::new();
            tree.bounds_query(&Aabb2::new(Vec2::splat(100.0), Vec2::splat(110.0)), &mut results);
            assert!(results.is_empty());
        }
    }

    #[test]
    fn test_rtree_point_query() {
        for strategy in STRATEGIES {
            let tree = build(
                vec![
                    (Aabb2::new(Vec2::ZERO, Vec2::splat(10.0)), "rect1"),
                    (Aabb2::new(Vec2::splat(5.0), Vec2::splat(15.0)), "rect2"),
                ],
                4,
                strategy,
            );

            // Inside both rectangles
            let mut results = Vec::new();
            tree.point_query(Vec2::splat(7.0), &mut results);
            assert_eq!(results.len(), 2);

            // Inside only rect1
            let mut results = Vec::new();
            tree.point_query(Vec2::splat(2.0), &mut results);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].1, "rect1");

            // Outside all
            let mut results = Vec::new();
            tree.point_query(Vec2::splat(100.0), &mut results);
            assert!(results.is_empty());
        }
    }

    #[test]
    fn test_rtree_split() {
        for strategy in STRATEGIES {
            let rects: Vec<_> = (0..10)
                .map(|i| {
                    let offset = i as f32 * 10.0;
                    (Aabb2::new(Vec2::splat(offset), Vec2::splat(offset + 5.0)), i)
                })
                .collect();
            let tree = build(rects, 2, strategy);
            assert_eq!(tree.len(), 10);
            assert!(tree.depth() >= 3);
            assert_well_formed(&tree);

            // All entries should still be queryable
            for i in 0..10 {
                let offset = i as f32 * 10.0;
                let mut results = Vec::new();
                tree.point_query(Vec2::splat(offset + 2.5), &mut results);
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].1, i);
            }
        }
    }

    #[test]
    fn test_rtree_overlapping_results() {
        for strategy in STRATEGIES {
            let tree = build(
                vec![
                    (Aabb2::new(Vec2::ZERO, Vec2::splat(20.0)), "A"),
                    (Aabb2::new(Vec2::splat(10.0), Vec2::splat(30.0)), "B"),
                    (Aabb2::new(Vec2::splat(15.0), Vec2::splat(25.0)), "C"),
                ],
                2,
                strategy,
            );

            let mut results = Vec::new();
            tree.bounds_query(&Aabb2::new(Vec2::splat(12.0), Vec2::splat(18.0)), &mut results);
            assert_eq!(results.len(), 3);
        }
    }

    #[test]
    fn test_rtree_structure_is_well_formed() {
        for strategy in STRATEGIES {
            for capacity in [2, 3, 8] {
                let tree = build(grid(200), capacity, strategy);
                assert_well_formed(&tree);
                assert_eq!(tree.bounds(), union_all(grid(200).iter().map(|(b, _)| *b)));
            }
        }
    }

    #[test]
    fn test_str_leaves_are_full() {
        let tree = build(grid(64), 8, RTreeStrategy::SortTileRecursive);
        let leaves: Vec<_> = tree.nodes.iter().filter(|node| node.leaf).collect();
        assert_eq!(leaves.len(), 8);
        assert!(leaves.iter().all(|leaf| leaf.end - leaf.start == 8));
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_rtree_queries_match_linear_scan() {
        let rects = grid(300);
        for strategy in STRATEGIES {
            let tree = build(rects.clone(), 4, strategy);
            let query = Aabb2::new(Vec2::new(10.0, 5.0), Vec2::new(24.0, 17.0));

            let mut results = Vec::new();
            tree.bounds_query(&query, &mut results);
            let mut ids: Vec<_> = results.iter().map(|(_, id)| *id).collect();
            ids.sort();
            let expected: Vec<_> = rects
                .iter()
                .filter(|(b, _)| b.intersects(&query))
                .map(|(_, id)| *id)
                .collect();
            assert_eq!(ids, expected, "{strategy:?}");

            let center = Vec2::new(20.0, 20.0);
            let mut results = Vec::new();
            tree.range_query(center, 6.0, &mut results);
            let mut ids: Vec<_> = results.iter().map(|(_, id)| *id).collect();
            ids.sort();
            let expected: Vec<_> = rects
                .iter()
                .filter(|(b, _)| b.distance_squared_to_point(center) <= 36.0)
                .map(|(_, id)| *id)
                .collect();
            assert_eq!(ids, expected, "{strategy:?}");
        }
    }

    #[test]
    fn test_rtree_range_query_uses_closest_point() {
        for strategy in STRATEGIES {
            let tree = build(vec![(Aabb2::new(Vec2::new(3.0, -1.0), Vec2::new(5.0, 1.0)), ())], 4, strategy);

            let mut results = Vec::new();
            tree.range_query(Vec2::ZERO, 3.0, &mut results);
            assert_eq!(results.len(), 1);

            let mut results = Vec::new();
            tree.range_query(Vec2::ZERO, 2.9, &mut results);
            tree.range_query(Vec2::ZERO, f32::NAN, &mut results);
            assert!(results.is_empty());
        }
    }

    #[test]
    fn test_rtree_segment_query() {
        for strategy in STRATEGIES {
            let tree = build(
                vec![
                    (Aabb2::new(Vec2::new(2.0, -1.0), Vec2::new(3.0, 1.0)), "crossed"),
                    (Aabb2::new(Vec2::new(5.0, 2.0), Vec2::new(6.0, 3.0)), "above"),
                    (Aabb2::new(Vec2::new(20.0, -1.0), Vec2::new(21.0, 1.0)), "beyond"),
                ],
                2,
                strategy,
            );

            let mut results = Vec::new();
            tree.segment_query(&Segment::new(Vec2::ZERO, Vec2::new(10.0, 0.0)), &mut results);
            let names: Vec<_> = results.iter().map(|(_, name)| *name).collect();
            assert_eq!(names, vec!["crossed"]);
        }
    }

    #[test]
    fn test_rtree_segment_query_finds_short_crossing() {
        for strategy in STRATEGIES {
            let tree = build(
                vec![
                    (Aabb2::new(Vec2::ZERO, Vec2::splat(1.0)), "unit"),
                    (Aabb2::new(Vec2::splat(5.0), Vec2::splat(6.0)), "far"),
                ],
                2,
                strategy,
            );

            let mut results = Vec::new();
            tree.segment_query(&Segment::new(Vec2::new(-4e-7, 0.5), Vec2::new(4e-7, 0.5)), &mut results);
            let names: Vec<_> = results.iter().map(|(_, name)| *name).collect();
            assert_eq!(names, vec!["unit"], "{strategy:?}");
        }
    }

    #[test]
    fn test_rtree_degenerate_boxes() {
        for strategy in STRATEGIES {
            let tree = build(
                vec![
                    (Aabb2::new(Vec2::splat(1.0), Vec2::splat(1.0)), "point"),
                    (Aabb2::empty(), "empty"),
                    (Aabb2::new(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0)), "line"),
                ],
                2,
                strategy,
            );
            assert_eq!(tree.len(), 3);

            let mut results = Vec::new();
            tree.point_query(Vec2::splat(1.0), &mut results);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].1, "point");

            let everything = Aabb2::new(Vec2::splat(f32::NEG_INFINITY), Vec2::splat(f32::INFINITY));
            let mut results = Vec::new();
            tree.bounds_query(&everything, &mut results);
            let mut names: Vec<_> = results.iter().map(|(_, name)| *name).collect();
            names.sort();
            assert_eq!(names, vec!["line", "point"]);
        }
    }

    #[test]
    fn test_rtree_invalid_capacity() {
        let result = RTree2D::build(vec![Aabb2::empty()], |b| *b, RTreeConfig::new(1));
        assert_eq!(
            result.err(),
            Some(SpatialError::InvalidCapacity { capacity: 1, min: 2 })
        );
    }

    #[test]
    fn test_rtree3d_query() {
        for strategy in STRATEGIES {
            let boxes: Vec<_> = (0..50)
                .map(|i| {
                    let min = Vec3::new((i % 5) as f32, ((i / 5) % 5) as f32, (i / 25) as f32) * 4.0;
                    (Aabb3::new(min, min + Vec3::ONE), i)
                })
                .collect();
            let tree = RTree3D::build(
                boxes,
                |(b, _)| *b,
                RTreeConfig::new(4).with_strategy(strategy),
            )
            .unwrap();

            let mut results = Vec::new();
            tree.bounds_query(&Aabb3::new(Vec3::splat(3.5), Vec3::splat(4.5)), &mut results);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].1, 31);

            let mut results = Vec::new();
            tree.point_query(Vec3::new(0.5, 0.5, 4.5), &mut results);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].1, 25);
        }
    }

    #[test]
    fn test_slab_count() {
        assert_eq!(slab_count(1, 2), 1);
        assert_eq!(slab_count(4, 2), 2);
        assert_eq!(slab_count(5, 2), 3);
        assert_eq!(slab_count(8, 3), 2);
        assert_eq!(slab_count(9, 3), 3);
    }
}
