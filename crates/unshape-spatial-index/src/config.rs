//! Construction options for the spatial indices.

use crate::SpatialError;
use crate::aabb::Aabb;

/// Hard cap on [`OrthtreeConfig::max_depth`].
///
/// Past this depth a node is narrower than an `f32` can resolve for any
/// realistic extent, so deeper splits only burn memory.
pub const MAX_ORTHTREE_DEPTH: usize = 32;

/// How a [`KdTree`](crate::KdTree) picks its splitting element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KdTreeMode {
    /// Median split along the current axis.
    ///
    /// Ties on the axis are ordered by construction index, so the build is
    /// deterministic and coincident points still split evenly. Depth stays
    /// `O(log n)`; the build costs `O(n log n)` expected.
    #[default]
    Balanced,
    /// The first element of each slice (construction order) splits it.
    ///
    /// Cheaper to build and preserves insertion order along each path, but
    /// sorted or clustered input degrades depth towards `O(n)` and queries
    /// towards a linear scan. A slice whose elements all share the pivot's
    /// coordinate falls back to a split at its middle.
    Unbalanced,
}

/// Options for [`Orthtree`](crate::Orthtree) (quadtree/octree) construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrthtreeConfig<P> {
    /// Elements a leaf may hold before it subdivides.
    pub capacity: usize,
    /// Deepest level a node may subdivide to; leaves at this depth may exceed `capacity`.
    pub max_depth: usize,
    /// Root bounds. `None` uses the tight bounds of the elements. Elements
    /// outside the given bounds grow the root to include them. Empty or
    /// non-finite bounds are ignored.
    pub bounds: Option<Aabb<P>>,
}

impl<P> Default for OrthtreeConfig<P> {
    fn default() -> Self {
        Self {
            capacity: 8,
            max_depth: 16,
            bounds: None,
        }
    }
}

impl<P> OrthtreeConfig<P> {
    /// Creates a config with the given leaf capacity and maximum depth.
    pub fn new(capacity: usize, max_depth: usize) -> Self {
        Self {
            capacity,
            max_depth,
            bounds: None,
        }
    }

    /// Sets the leaf capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the maximum depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets explicit root bounds.
    pub fn with_bounds(mut self, bounds: Aabb<P>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Checks the capacity (at least 1) and depth (at most [`MAX_ORTHTREE_DEPTH`]).
    pub fn validate(&self) -> Result<(), SpatialError> {
        if self.capacity == 0 {
            return Err(SpatialError::InvalidCapacity {
                capacity: self.capacity,
                min: 1,
            });
        }
        if self.max_depth > MAX_ORTHTREE_DEPTH {
            return Err(SpatialError::InvalidMaxDepth {
                depth: self.max_depth,
                limit: MAX_ORTHTREE_DEPTH,
            });
        }
        Ok(())
    }
}

/// Grouping heuristic used to build an [`RTree`](crate::RTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RTreeStrategy {
    /// Sort-tile-recursive bulk packing.
    ///
    /// Boxes are sorted by center along x, cut into vertical slabs, each slab
    /// sorted along the next axis and tiled again, then packed into full
    /// nodes. Parent levels are packed the same way. Ties are ordered by
    /// construction index. Produces near-full nodes with little overlap.
    #[default]
    SortTileRecursive,
    /// One-by-one insertion in construction order.
    ///
    /// Each box descends into the child needing the least area enlargement
    /// (first child on ties); overflowing nodes are split with the quadratic
    /// split heuristic. Slower to build and more overlap than packing, but
    /// follows the input order.
    QuadraticInsert,
}

/// Options for [`RTree`](crate::RTree) construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RTreeConfig {
    /// Maximum children (or elements, at leaves) per node.
    pub node_capacity: usize,
    /// Grouping heuristic.
    pub strategy: RTreeStrategy,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            node_capacity: 8,
            strategy: RTreeStrategy::default(),
        }
    }
}

impl RTreeConfig {
    /// Smallest accepted node capacity.
    pub const MIN_NODE_CAPACITY: usize = 2;

    /// Creates a config with the given node capacity and default strategy.
    pub fn new(node_capacity: usize) -> Self {
        Self {
            node_capacity,
            ..Self::default()
        }
    }

    /// Sets the node capacity.
    pub fn with_node_capacity(mut self, node_capacity: usize) -> Self {
        self.node_capacity = node_capacity;
        self
    }

    /// Sets the grouping heuristic.
    pub fn with_strategy(mut self, strategy: RTreeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Checks the node capacity.
    pub fn validate(&self) -> Result<(), SpatialError> {
        if self.node_capacity < Self::MIN_NODE_CAPACITY {
            return Err(SpatialError::InvalidCapacity {
                capacity: self.node_capacity,
                min: Self::MIN_NODE_CAPACITY,
            });
        }
        Ok(())
    }
}

/// Options for [`SpatialHash`](crate::SpatialHash) construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpatialHashConfig {
    /// Edge length of one grid cell.
    pub cell_size: f64,
}

impl Default for SpatialHashConfig {
    fn default() -> Self {
        Self { cell_size: 1.0 }
    }
}

impl SpatialHashConfig {
    /// Creates a config with the given cell size.
    pub fn new(cell_size: f64) -> Self {
        Self { cell_size }
    }

    /// Checks that the cell size is positive and finite.
    pub fn validate(&self) -> Result<(), SpatialError> {
        if self.cell_size > 0.0 && self.cell_size.is_finite() {
            Ok(())
        } else {
            Err(SpatialError::InvalidCellSize(self.cell_size))
        }
    }
}
