//! Spatial index error types.

use thiserror::Error;

/// Errors raised when a spatial index is configured with invalid options.
///
/// Queries never fail; only construction and explicit validation return these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    /// Node capacity below the structure's minimum.
    #[error("node capacity must be at least {min}, got {capacity}")]
    InvalidCapacity {
        /// Requested capacity.
        capacity: usize,
        /// Smallest accepted capacity.
        min: usize,
    },

    /// Maximum depth above the hard limit.
    #[error("max depth {depth} exceeds the limit of {limit}")]
    InvalidMaxDepth {
        /// Requested depth.
        depth: usize,
        /// Largest accepted depth.
        limit: usize,
    },

    /// Cell size that is zero, negative, NaN or infinite.
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),

    /// Negative or NaN radius.
    #[error("radius must be non-negative, got {0}")]
    InvalidRadius(f64),
}
