//! Property tests for the join protocol and the downsampler.

use std::collections::BTreeSet;

use neurite_engine::geom::{downsample_buffer, simplify_window};
use neurite_engine::{
    Calibration, DownsampleOptions, JoinEnd, Path, PathId, PathSet, Point3, PointBuffer,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ═════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════

/// Random walk of `n` nodes with steps of at most `step` on each axis.
fn random_walk(seed: u64, n: usize, step: f64) -> Vec<Point3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut current = Point3::ORIGIN;
    (0..n)
        .map(|_| {
            let point = current;
            current = Point3::new(
                current.x + rng.random_range(-step..=step),
                current.y + rng.random_range(-step..=step),
                current.z + rng.random_range(-step..=step),
            );
            point
        })
        .collect()
}

fn path_set(count: usize, seed: u64) -> (PathSet, Vec<PathId>) {
    let mut set = PathSet::new();
    let ids = (0..count)
        .map(|i| {
            let points = random_walk(seed + i as u64, 8, 1.0);
            set.insert(Path::from_points(Calibration::unit_pixels(), &points))
                .unwrap()
        })
        .collect();
    (set, ids)
}

#[derive(Debug, Clone)]
enum Op {
    Join { path: usize, end: bool, other: usize },
    Unjoin { path: usize, end: bool },
    Disconnect { path: usize },
}

fn op_strategy(count: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..count, any::<bool>(), 0..count)
            .prop_map(|(path, end, other)| Op::Join { path, end, other }),
        2 => (0..count, any::<bool>()).prop_map(|(path, end)| Op::Unjoin { path, end }),
        1 => (0..count).prop_map(|path| Op::Disconnect { path }),
    ]
}

const fn end_of(flag: bool) -> JoinEnd {
    if flag { JoinEnd::End } else { JoinEnd::Start }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Join protocol keeps adjacency derivable from the joins
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn adjacency_always_matches_joins(
        seed in 0u64..1_000,
        ops in prop::collection::vec(op_strategy(5), 1..40),
    ) {
        let (mut set, ids) = path_set(5, seed);
        for op in ops {
            let before = set.summaries();
            let result = match op {
                Op::Join { path, end, other } => {
                    let anchor = set.path(ids[other]).unwrap().point(0).unwrap();
                    set.set_join(ids[path], end_of(end), ids[other], anchor)
                }
                Op::Unjoin { path, end } => set.unset_join(ids[path], end_of(end)).map(|_| ()),
                Op::Disconnect { path } => set.disconnect_from_all(ids[path]),
            };
            if result.is_err() {
                prop_assert_eq!(set.summaries(), before);
            }
            prop_assert!(set.validate().is_ok());

            let mut rebuilt = set.clone();
            rebuilt.rebuild_adjacency();
            for id in &ids {
                prop_assert_eq!(
                    set.somehow_joins(*id).unwrap(),
                    rebuilt.somehow_joins(*id).unwrap()
                );
            }
        }
    }

    #[test]
    fn orders_are_positive_and_follow_parents(
        seed in 0u64..1_000,
        ops in prop::collection::vec(op_strategy(6), 1..30),
    ) {
        let (mut set, ids) = path_set(6, seed);
        for op in ops {
            if let Op::Join { path, end, other } = op {
                let anchor = set.path(ids[other]).unwrap().point(0).unwrap();
                let _ = set.set_join(ids[path], end_of(end), ids[other], anchor);
            }
        }
        set.recompute_orders();
        for id in &ids {
            let path = set.path(*id).unwrap();
            prop_assert!(path.order() >= 1);
            let parent = path.start_join().or(path.end_join()).map(|join| join.target);
            match parent {
                Some(parent) => {
                    let parent_order = set.path(parent).unwrap().order();
                    prop_assert_eq!(path.order(), parent_order + 1);
                }
                None => prop_assert_eq!(path.order(), 1),
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Downsampling
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn dropped_nodes_stay_within_tolerance(
        seed in 0u64..10_000,
        n in 2usize..60,
        epsilon in 0.0f64..2.0,
    ) {
        let points = random_walk(seed, n, 1.0);
        let kept = simplify_window(&points, epsilon);
        prop_assert_eq!(kept.first(), Some(&0));
        prop_assert_eq!(kept.last(), Some(&(n - 1)));
        for pair in kept.windows(2) {
            let (a, b) = (points[pair[0]], points[pair[1]]);
            for point in &points[pair[0] + 1..pair[1]] {
                prop_assert!(point.distance_to_segment(a, b) <= epsilon + 1e-9);
            }
        }
    }

    #[test]
    fn fixed_nodes_survive_unmoved(
        seed in 0u64..10_000,
        n in 2usize..60,
        epsilon in 0.0f64..5.0,
        fixed in prop::collection::btree_set(0usize..60, 0..6),
    ) {
        let points = random_walk(seed, n, 1.0);
        let buffer = PointBuffer::from_points(Calibration::unit_pixels(), &points);
        let fixed: BTreeSet<usize> = fixed.into_iter().filter(|i| *i < n).collect();
        let (result, diag) = downsample_buffer(&buffer, &fixed, DownsampleOptions::new(epsilon));

        prop_assert_eq!(result.first(), buffer.first());
        prop_assert_eq!(result.last(), buffer.last());
        for index in &fixed {
            prop_assert!(result.contains(points[*index]));
        }
        prop_assert_eq!(diag.output_point_count + diag.points_removed, n);
        prop_assert!(result.length() <= buffer.length() + 1e-9);
    }

    #[test]
    fn smaller_tolerance_never_keeps_fewer_nodes(
        seed in 0u64..10_000,
        n in 2usize..60,
        coarse in 0.0f64..3.0,
        ratio in 0.0f64..1.0,
    ) {
        let points = random_walk(seed, n, 1.0);
        let fine = coarse * ratio;
        let coarse_kept: BTreeSet<usize> = simplify_window(&points, coarse).into_iter().collect();
        let fine_kept: BTreeSet<usize> = simplify_window(&points, fine).into_iter().collect();
        prop_assert!(coarse_kept.is_subset(&fine_kept));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Point buffer queries
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn nearest_index_is_the_first_closest(
        seed in 0u64..10_000,
        n in 1usize..40,
        target in (-5.0f64..5.0, -5.0f64..5.0, -5.0f64..5.0),
    ) {
        let points = random_walk(seed, n, 1.0);
        let buffer = PointBuffer::from_points(Calibration::unit_pixels(), &points);
        let target = Point3::new(target.0, target.1, target.2);
        let best = buffer.nearest_index_unbounded(target).unwrap();
        let best_distance = points[best].distance_squared_to(target);
        for (i, point) in points.iter().enumerate() {
            let distance = point.distance_squared_to(target);
            prop_assert!(distance >= best_distance);
            if i < best {
                prop_assert!(distance > best_distance);
            }
        }
    }

    #[test]
    fn concatenation_length_is_additive(
        seed in 0u64..10_000,
        n in 2usize..20,
        m in 2usize..20,
    ) {
        let head = random_walk(seed, n, 1.0);
        let tail: Vec<Point3> = random_walk(seed + 1, m, 1.0)
            .into_iter()
            .map(|p| Point3::new(p.x + 100.0, p.y, p.z))
            .collect();
        let bridge = head[n - 1].distance_to(tail[0]);

        let mut set = PathSet::new();
        let a = set.insert(Path::from_points(Calibration::unit_pixels(), &head)).unwrap();
        let b = set.insert(Path::from_points(Calibration::unit_pixels(), &tail)).unwrap();
        let expected = set.path(a).unwrap().length() + set.path(b).unwrap().length() + bridge;
        set.concatenate(a, b).unwrap();
        let merged = set.path(a).unwrap();
        prop_assert_eq!(merged.size(), n + m);
        prop_assert!((merged.length() - expected).abs() < 1e-6);
    }
}
