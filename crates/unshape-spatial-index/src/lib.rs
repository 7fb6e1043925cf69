//! Immutable spatial indices for fast proximity and region queries.
//!
//! Every structure is built once from a snapshot of elements plus a
//! projection (element to point, or element to box) and is never modified
//! afterwards; rebuild it when the data changes.
//!
//! - [`KdTree2D`] / [`KdTree3D`] - KD-trees with balanced or insertion-order splits and k-nearest-neighbor search
//! - [`Quadtree`] / [`Octree`] - capacity-driven orthant subdivision with a depth cap
//! - [`RTree2D`] / [`RTree3D`] - R-trees over boxes, bulk-packed or built by quadratic insertion
//! - [`SpatialHash2D`] / [`SpatialHash3D`] - uniform grid buckets for point sets rebuilt every frame
//!
//! All of them implement [`SpatialQuery`]. Queries append `&T` results to a
//! caller-owned [`QueryBuffer`] (a `Vec`, `VecDeque` or `SmallVec`) and hand
//! that buffer back; they never clear it and never allocate the result
//! container themselves.
//!
//! # Example
//!
//! ```
//! use unshape_spatial_index::{Aabb2, KdTree2D, OrthtreeConfig, Quadtree};
//! use glam::Vec2;
//!
//! let points = vec![
//!     (Vec2::new(10.0, 20.0), "point A"),
//!     (Vec2::new(50.0, 50.0), "point B"),
//! ];
//!
//! let kd = KdTree2D::build(points.clone(), |(position, _)| *position);
//! let mut nearest = Vec::new();
//! kd.approximate_nearest_neighbors(Vec2::new(12.0, 18.0), 1, &mut nearest);
//! assert_eq!(nearest[0].1, "point A");
//!
//! let quadtree = Quadtree::build(points, |(position, _)| *position, OrthtreeConfig::default())?;
//! let mut results = Vec::new();
//! quadtree.bounds_query(&Aabb2::new(Vec2::ZERO, Vec2::splat(30.0)), &mut results);
//! assert_eq!(results.len(), 1);
//! # Ok::<(), unshape_spatial_index::SpatialError>(())
//! ```

mod aabb;
mod buffer;
mod config;
mod error;
mod kdtree;
mod orthtree;
mod point;
mod query;
mod rtree;
mod segment;
mod spatial_hash;
mod sphere;

pub use aabb::*;
pub use buffer::*;
pub use config::*;
pub use error::*;
pub use kdtree::*;
pub use orthtree::*;
pub use point::*;
pub use query::*;
pub use rtree::*;
pub use segment::*;
pub use spatial_hash::*;
pub use sphere::*;


/// Randomized invariant tests for the spatial indices.
///
/// Every index is checked against a linear scan over the same elements.
/// Run with:
///
/// ```sh
/// cargo test -p unshape-spatial-index --features invariant-tests
/// ```
#[cfg(all(test, feature = "invariant-tests"))]
mod invariant_tests {
    use glam::{Vec2, Vec3};

    use super::*;

    fn sorted_ids<P>(hits: Vec<&(P, usize)>) -> Vec<usize> {
        let mut ids: Vec<_> = hits.into_iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        ids
    }

    fn random_points2(count: usize) -> Vec<(Vec2, usize)> {
        let mut points: Vec<Vec2> = (0..count)
            .map(|_| Vec2::new(rand_f32(0.0, 100.0), rand_f32(0.0, 100.0)))
            .collect();
        // Duplicates and a tight cluster exercise ties and deep subdivision.
        points.extend_from_slice(&points[..count / 10].to_vec());
        points.extend((0..count / 10).map(|_| Vec2::new(rand_f32(40.0, 40.01), rand_f32(40.0, 40.01))));
        points.into_iter().enumerate().map(|(i, p)| (p, i)).collect()
    }

    fn random_points3(count: usize) -> Vec<(Vec3, usize)> {
        let mut points: Vec<Vec3> = (0..count)
            .map(|_| Vec3::new(rand_f32(0.0, 100.0), rand_f32(0.0, 100.0), rand_f32(0.0, 100.0)))
            .collect();
        points.extend_from_slice(&points[..count / 10].to_vec());
        points.into_iter().enumerate().map(|(i, p)| (p, i)).collect()
    }

    fn random_box2() -> Aabb2 {
        let min = Vec2::new(rand_f32(-10.0, 100.0), rand_f32(-10.0, 100.0));
        Aabb2::new(min, min + Vec2::new(rand_f32(0.0, 30.0), rand_f32(0.0, 30.0)))
    }

    fn random_box3() -> Aabb3 {
        let min = Vec3::new(rand_f32(-10.0, 100.0), rand_f32(-10.0, 100.0), rand_f32(-10.0, 100.0));
        Aabb3::new(min, min + Vec3::splat(rand_f32(0.0, 30.0)))
    }

    /// Range and bounds queries return exactly the linear-scan result,
    /// twice in a row, and a bounds query over everything returns every element.
    fn check_point_index<P, S>(index: &S, points: &[(P, usize)], queries: &[(P, P::Scalar)], boxes: &[Aabb<P>])
    where
        P: Point,
        S: SpatialQuery<P, Item = (P, usize)>,
    {
        assert_eq!(index.len(), points.len());

        for &(center, radius) in queries {
            let mut first = Vec::new();
            let mut second = Vec::new();
            index.range_query(center, radius, &mut first);
            index.range_query(center, radius, &mut second);
            assert_eq!(first, second, "range query is not idempotent");

            let expected: Vec<_> = points
                .iter()
                .filter(|(p, _)| p.distance_squared(center) <= radius * radius)
                .map(|(_, id)| *id)
                .collect();
            assert_eq!(sorted_ids(first), expected, "range query {center:?} r={radius:?}");
        }

        for bounds in boxes {
            let mut hits = Vec::new();
            index.bounds_query(bounds, &mut hits);
            let expected: Vec<_> = points
                .iter()
                .filter(|(p, _)| bounds.contains_point(*p))
                .map(|(_, id)| *id)
                .collect();
            assert_eq!(sorted_ids(hits), expected, "bounds query {bounds:?}");
        }

        let everything = Aabb::from_points(points.iter().map(|(p, _)| *p));
        let mut hits = Vec::new();
        index.bounds_query(&everything, &mut hits);
        assert_eq!(sorted_ids(hits), (0..points.len()).collect::<Vec<_>>());
    }

    fn check_all_point_indices2(points: &[(Vec2, usize)]) {
        let queries: Vec<(Vec2, f32)> = (0..40)
            .map(|_| (Vec2::new(rand_f32(-10.0, 110.0), rand_f32(-10.0, 110.0)), rand_f32(0.0, 25.0)))
            .collect();
        let boxes: Vec<Aabb2> = (0..40).map(|_| random_box2()).collect();
        let key = |(p, _): &(Vec2, usize)| *p;

        for mode in [KdTreeMode::Balanced, KdTreeMode::Unbalanced] {
            let tree = KdTree2D::build_with_mode(points.to_vec(), key, mode);
            check_point_index(&tree, points, &queries, &boxes);
        }
        for (capacity, max_depth) in [(1, 12), (4, 8), (16, 3)] {
            let tree = Quadtree::build(points.to_vec(), key, OrthtreeConfig::new(capacity, max_depth)).unwrap();
            check_point_index(&tree, points, &queries, &boxes);
        }
        for cell_size in [0.5, 7.0, 250.0] {
            let hash = SpatialHash2D::build(points.to_vec(), key, SpatialHashConfig::new(cell_size)).unwrap();
            check_point_index(&hash, points, &queries, &boxes);
        }
    }

    #[test]
    fn test_point_indices_match_linear_scan_2d() {
        check_all_point_indices2(&random_points2(400));
    }

    #[test]
    fn test_point_indices_match_linear_scan_3d() {
        let points = random_points3(400);
        let queries: Vec<(Vec3, f32)> = (0..40)
            .map(|_| {
                let center = Vec3::new(rand_f32(-10.0, 110.0), rand_f32(-10.0, 110.0), rand_f32(-10.0, 110.0));
                (center, rand_f32(0.0, 30.0))
            })
            .collect();
        let boxes: Vec<Aabb3> = (0..40).map(|_| random_box3()).collect();
        let key = |(p, _): &(Vec3, usize)| *p;

        for mode in [KdTreeMode::Balanced, KdTreeMode::Unbalanced] {
            let tree = KdTree3D::build_with_mode(points.clone(), key, mode);
            check_point_index(&tree, &points, &queries, &boxes);
        }
        let tree = Octree::build(points.clone(), key, OrthtreeConfig::new(4, 10)).unwrap();
        check_point_index(&tree, &points, &queries, &boxes);
        let hash = SpatialHash3D::build(points.clone(), key, SpatialHashConfig::new(9.0)).unwrap();
        check_point_index(&hash, &points, &queries, &boxes);
    }

    #[test]
    fn test_sorted_input_matches_linear_scan() {
        let points: Vec<(Vec2, usize)> = (0..300).map(|i| (Vec2::new(i as f32 * 0.3, 50.0), i)).collect();
        check_all_point_indices2(&points);
    }

    #[test]
    fn test_k_nearest_matches_linear_scan() {
        let points = random_points2(300);
        for mode in [KdTreeMode::Balanced, KdTreeMode::Unbalanced] {
            let tree = KdTree2D::build_with_mode(points.clone(), |(p, _)| *p, mode);
            for _ in 0..50 {
                let query = Vec2::new(rand_f32(-10.0, 110.0), rand_f32(-10.0, 110.0));
                let count = (rand_f32(0.0, 12.0) as usize).max(1);

                let mut expected: Vec<_> = points
                    .iter()
                    .map(|(p, id)| (p.distance_squared(query), *id))
                    .collect();
                expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let expected: Vec<_> = expected.into_iter().take(count).map(|(_, id)| id).collect();

                let mut hits = Vec::new();
                tree.approximate_nearest_neighbors(query, count, &mut hits);
                let ids: Vec<_> = hits.iter().map(|(_, id)| *id).collect();
                assert_eq!(ids, expected, "{mode:?} k={count} at {query:?}");
            }
        }
    }

    #[test]
    fn test_k_nearest_contains_self() {
        let points = random_points3(200);
        let tree = KdTree3D::build(points.clone(), |(p, _)| *p);
        for (point, _) in &points {
            let mut hits = Vec::new();
            tree.approximate_nearest_neighbors(*point, 3, &mut hits);
            assert_eq!(hits.len(), 3);
            assert_eq!(hits[0].0, *point);
        }
    }

    #[test]
    fn test_rtree_matches_linear_scan() {
        let rects: Vec<(Aabb2, usize)> = (0..400).map(|i| (random_box2(), i)).collect();
        let queries: Vec<Aabb2> = (0..40).map(|_| random_box2()).collect();

        for strategy in [RTreeStrategy::SortTileRecursive, RTreeStrategy::QuadraticInsert] {
            for capacity in [2, 5, 16] {
                let config = RTreeConfig::new(capacity).with_strategy(strategy);
                let tree = RTree2D::build(rects.clone(), |(b, _)| *b, config).unwrap();
                assert_eq!(tree.len(), rects.len());

                for query in &queries {
                    let mut hits = Vec::new();
                    tree.bounds_query(query, &mut hits);
                    let expected: Vec<_> = rects
                        .iter()
                        .filter(|(b, _)| b.intersects(query))
                        .map(|(_, id)| *id)
                        .collect();
                    assert_eq!(sorted_ids(hits), expected);

                    let center = query.center();
                    let radius = query.size().x;
                    let mut hits = Vec::new();
                    tree.range_query(center, radius, &mut hits);
                    let expected: Vec<_> = rects
                        .iter()
                        .filter(|(b, _)| b.distance_squared_to_point(center) <= radius * radius)
                        .map(|(_, id)| *id)
                        .collect();
                    assert_eq!(sorted_ids(hits), expected);

                    let mut hits = Vec::new();
                    tree.point_query(center, &mut hits);
                    let expected: Vec<_> = rects
                        .iter()
                        .filter(|(b, _)| b.contains_point(center))
                        .map(|(_, id)| *id)
                        .collect();
                    assert_eq!(sorted_ids(hits), expected);

                    let segment = Segment::new(query.min, query.max + Vec2::new(40.0, -20.0));
                    let mut hits = Vec::new();
                    tree.segment_query(&segment, &mut hits);
                    let expected: Vec<_> = rects
                        .iter()
                        .filter(|(b, _)| segment.intersects_aabb(b))
                        .map(|(_, id)| *id)
                        .collect();
                    assert_eq!(sorted_ids(hits), expected);
                }

                let mut hits = Vec::new();
                tree.bounds_query(&tree.bounds(), &mut hits);
                assert_eq!(hits.len(), rects.len());
            }
        }
    }

    #[test]
    fn test_rtree3d_matches_linear_scan() {
        let boxes: Vec<(Aabb3, usize)> = (0..300).map(|i| (random_box3(), i)).collect();
        for strategy in [RTreeStrategy::SortTileRecursive, RTreeStrategy::QuadraticInsert] {
            let config = RTreeConfig::new(6).with_strategy(strategy);
            let tree = RTree3D::build(boxes.clone(), |(b, _)| *b, config).unwrap();
            for _ in 0..30 {
                let query = random_box3();
                let mut hits = Vec::new();
                tree.bounds_query(&query, &mut hits);
                let expected: Vec<_> = boxes
                    .iter()
                    .filter(|(b, _)| b.intersects(&query))
                    .map(|(_, id)| *id)
                    .collect();
                assert_eq!(sorted_ids(hits), expected);
            }
        }
    }

    #[test]
    fn test_empty_input_answers_nothing() {
        let empty: Vec<(Vec2, usize)> = Vec::new();
        let key = |(p, _): &(Vec2, usize)| *p;
        let region = Aabb2::new(Vec2::splat(-1e6), Vec2::splat(1e6));

        fn check<S: SpatialQuery<Vec2, Item = (Vec2, usize)>>(index: &S, region: &Aabb2) {
            assert!(index.is_empty());
            let mut hits = Vec::new();
            index.range_query(Vec2::ZERO, 1e6, &mut hits);
            index.bounds_query(region, &mut hits);
            assert!(hits.is_empty());
        }

        check(&KdTree2D::build(empty.clone(), key), &region);
        check(&Quadtree::build(empty.clone(), key, OrthtreeConfig::default()).unwrap(), &region);
        check(&SpatialHash2D::build(empty.clone(), key, SpatialHashConfig::default()).unwrap(), &region);
        check(
            &RTree2D::build(empty, |(p, _)| Aabb2::new(*p, *p), RTreeConfig::default()).unwrap(),
            &region,
        );
    }

    #[test]
    fn test_aabb_union_contains_both() {
        for _ in 0..100 {
            let a = random_box2();
            let b = random_box2();
            let union = a.union(&b);
            assert!(union.contains_aabb(&a));
            assert!(union.contains_aabb(&b));
            assert_eq!(a.union(&Aabb2::empty()), a);
        }
    }

    #[test]
    fn test_child_bounds_partition_parent() {
        for _ in 0..100 {
            let parent = random_box3();
            let point = Vec3::new(
                rand_f32(parent.min.x, parent.max.x),
                rand_f32(parent.min.y, parent.max.y),
                rand_f32(parent.min.z, parent.max.z),
            );
            let child = parent.child_bounds(parent.child_index(point));
            assert!(parent.contains_aabb(&child));
            assert!(child.contains_point(point));
        }
    }

    #[test]
    fn test_segment_closest_point_is_on_segment() {
        for _ in 0..100 {
            let segment = Segment::new(
                Vec2::new(rand_f32(-50.0, 50.0), rand_f32(-50.0, 50.0)),
                Vec2::new(rand_f32(-50.0, 50.0), rand_f32(-50.0, 50.0)),
            );
            let point = Vec2::new(rand_f32(-50.0, 50.0), rand_f32(-50.0, 50.0));
            let closest = segment.closest_point(point);
            let distance = segment.distance_squared_to_point(point);
            assert!(distance <= point.distance_squared(segment.start) + 1e-3);
            assert!(distance <= point.distance_squared(segment.end) + 1e-3);
            assert!((closest.distance_squared(point) - distance).abs() < 1e-3);
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    /// Simple LCG random number generator for tests.
    fn rand_f32(min: f32, max: f32) -> f32 {
        use std::cell::Cell;
        thread_local! {
            static SEED: Cell<u64> = const { Cell::new(12345) };
        }
        SEED.with(|seed| {
            let s = seed.get().wrapping_mul(6364136223846793005).wrapping_add(1);
            seed.set(s);
            let t = ((s >> 33) as u32) as f32 / u32::MAX as f32;
            min + t * (max - min)
        })
    }
}
