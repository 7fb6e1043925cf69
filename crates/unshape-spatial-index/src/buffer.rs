//! The result-buffer calling convention shared by every query.
//!
//! Queries never allocate their result container. The caller passes a
//! mutable, order-preserving buffer; the query appends hits in traversal
//! order and hands the same buffer back, so the call can sit directly in a
//! `for` loop. Buffers are never cleared by a query: clear (or reuse) them
//! between frames yourself.
//!
//! ```
//! use unshape_spatial_index::KdTree2D;
//! use glam::Vec2;
//!
//! let tree = KdTree2D::build([Vec2::ZERO, Vec2::new(3.0, 0.0)], |p| *p);
//! let mut hits = Vec::new();
//! for p in tree.range_query(Vec2::ZERO, 1.0, &mut hits).iter() {
//!     assert_eq!(**p, Vec2::ZERO);
//! }
//! hits.clear();
//! ```

use std::collections::VecDeque;

use smallvec::{Array, SmallVec};

/// An append-only, order-preserving sink for query results.
pub trait QueryBuffer<I> {
    /// Appends one result after all existing contents.
    fn push_result(&mut self, item: I);

    /// Hint that `additional` results are about to be appended.
    fn reserve_results(&mut self, additional: usize) {
        let _ = additional;
    }
}

impl<I> QueryBuffer<I> for Vec<I> {
    #[inline]
    fn push_result(&mut self, item: I) {
        self.push(item);
    }

    fn reserve_results(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

impl<I> QueryBuffer<I> for VecDeque<I> {
    #[inline]
    fn push_result(&mut self, item: I) {
        self.push_back(item);
    }

    fn reserve_results(&mut self, additional: usize) {
        self.reserve(additional);
    }
}

impl<A: Array> QueryBuffer<A::Item> for SmallVec<A> {
    #[inline]
    fn push_result(&mut self, item: A::Item) {
        self.push(item);
    }

    fn reserve_results(&mut self, additional: usize) {
        self.reserve(additional);
    }
}
