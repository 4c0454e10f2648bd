//! Fixed-point preserving polyline downsampling.
//!
//! Simplification runs independently inside each window delimited by two
//! consecutive fixed indices (path ends and join points), so fixed nodes are
//! never moved nor dropped.
//!
//! # Algorithm
//!
//! Within a window the classic Ramer–Douglas–Peucker scheme is applied in 3D:
//! 1. Find the interior node farthest from the segment joining the window ends.
//! 2. If that distance exceeds the tolerance, keep the node and split there.
//! 3. Otherwise drop every interior node of the span.
//!
//! Radii of surviving nodes are re-averaged over the original nodes each one
//! absorbed, and tangents are recomputed afterwards.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use neurite_engine::geom::{downsample_buffer, Calibration, DownsampleOptions, Point3, PointBuffer};
//!
//! let points: Vec<Point3> = (0..5).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
//! let buffer = PointBuffer::from_points(Calibration::unit_pixels(), &points);
//! let (simplified, diag) = downsample_buffer(&buffer, &BTreeSet::new(), DownsampleOptions::new(0.1));
//! assert_eq!(simplified.len(), 2);
//! assert_eq!(diag.points_removed, 3);
//! ```

use std::collections::BTreeSet;

use super::core::Point3;
use super::points::{PointBuffer, DEFAULT_TANGENT_WINDOW};

/// Options for downsampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownsampleOptions {
    /// Largest allowed distance between a dropped node and the segment that
    /// replaces it, in calibrated units. Non-positive values only remove
    /// exactly collinear nodes.
    pub max_deviation: f64,
    /// Nodes on either side used when recomputing tangents.
    pub tangent_window: usize,
}

impl DownsampleOptions {
    #[must_use]
    pub const fn new(max_deviation: f64) -> Self {
        Self {
            max_deviation,
            tangent_window: DEFAULT_TANGENT_WINDOW,
        }
    }

    /// Set the tangent window used after reassembly.
    #[must_use]
    pub const fn tangent_window(mut self, window: usize) -> Self {
        self.tangent_window = window;
        self
    }
}

impl Default for DownsampleOptions {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Diagnostics for downsampling operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownsampleDiagnostics {
    /// Number of input nodes.
    pub input_point_count: usize,
    /// Number of output nodes.
    pub output_point_count: usize,
    /// Number of nodes dropped.
    pub points_removed: usize,
    /// Number of windows simplified independently.
    pub window_count: usize,
}

/// Simplify a single window and return the indices (into `points`) that
/// survive. The first and last index are always kept.
#[must_use]
pub fn simplify_window(points: &[Point3], max_deviation: f64) -> Vec<usize> {
    if points.len() <= 2 {
        return (0..points.len()).collect();
    }

    let tolerance = max_deviation.max(0.0);
    let mut mask = vec![false; points.len()];
    mask[0] = true;
    mask[points.len() - 1] = true;

    rdp(points, tolerance, &mut mask);

    mask.iter()
        .enumerate()
        .filter_map(|(i, keep)| keep.then_some(i))
        .collect()
}

fn rdp(points: &[Point3], tolerance: f64, mask: &mut [bool]) {
    let mut spans = vec![(0, points.len() - 1)];

    while let Some((start, end)) = spans.pop() {
        if end <= start + 1 {
            continue;
        }

        let segment_start = points[start];
        let segment_end = points[end];
        let mut max_idx = start;
        let mut max_distance = -1.0;

        for (i, point) in points.iter().enumerate().take(end).skip(start + 1) {
            let d = point.distance_to_segment(segment_start, segment_end);
            if d > max_distance {
                max_distance = d;
                max_idx = i;
            }
        }

        if max_distance > tolerance {
            mask[max_idx] = true;
            spans.push((max_idx, end));
            spans.push((start, max_idx));
        }
    }
}

/// Downsample `buffer`, keeping every index in `fixed` plus both ends.
///
/// Fixed indices beyond the buffer are ignored.
#[must_use = "downsampling returns a new buffer"]
pub fn downsample_buffer(
    buffer: &PointBuffer,
    fixed: &BTreeSet<usize>,
    options: DownsampleOptions,
) -> (PointBuffer, DownsampleDiagnostics) {
    let mut diagnostics = DownsampleDiagnostics {
        input_point_count: buffer.len(),
        ..Default::default()
    };

    let Some(last) = buffer.len().checked_sub(1) else {
        return (buffer.clone(), diagnostics);
    };

    let mut anchors: BTreeSet<usize> = fixed.iter().copied().filter(|&i| i <= last).collect();
    anchors.insert(0);
    anchors.insert(last);

    let points = buffer.positions();
    let mut kept = vec![0];
    let anchors: Vec<usize> = anchors.into_iter().collect();
    for window in anchors.windows(2) {
        let (a, b) = (window[0], window[1]);
        let survivors = simplify_window(&points[a..=b], options.max_deviation);
        log::trace!(
            "downsample window {a}..={b}: {} of {} nodes kept",
            survivors.len(),
            b - a + 1
        );
        // The window start equals the previous window end.
        kept.extend(survivors.into_iter().skip(1).map(|i| a + i));
        diagnostics.window_count += 1;
    }

    let radii = buffer.radii().map(|radii| average_radii(radii, &kept));
    let mut result = buffer.select(&kept, radii);
    if result.has_radii() && options.tangent_window != DEFAULT_TANGENT_WINDOW {
        // Radii are present, so this cannot fail.
        let _ = result.guess_tangents(options.tangent_window);
    }

    diagnostics.output_point_count = result.len();
    diagnostics.points_removed = diagnostics
        .input_point_count
        .saturating_sub(diagnostics.output_point_count);
    (result, diagnostics)
}

/// Mean radius over the original nodes each kept node stands for.
///
/// A kept node absorbs the original nodes up to the midpoint index between
/// itself and each surviving neighbour; the first and last kept nodes only
/// extend inwards.
fn average_radii(radii: &[f64], kept: &[usize]) -> Vec<f64> {
    let n = kept.len();
    (0..n)
        .map(|k| {
            let here = kept[k];
            let lo = if k == 0 { here } else { (kept[k - 1] + here) / 2 };
            let hi = if k + 1 == n { here } else { (here + kept[k + 1]) / 2 };
            let span = &radii[lo..=hi];
            span.iter().sum::<f64>() / span.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Calibration;

    fn buffer_of(points: &[[f64; 3]]) -> PointBuffer {
        let points: Vec<Point3> = points.iter().copied().map(Point3::from).collect();
        PointBuffer::from_points(Calibration::unit_pixels(), &points)
    }

    #[test]
    fn two_point_window_is_unchanged() {
        let points = [Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)];
        assert_eq!(simplify_window(&points, 10.0), vec![0, 1]);
    }

    #[test]
    fn collinear_points_collapse() {
        let points: Vec<Point3> = (0..10).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
        assert_eq!(simplify_window(&points, 0.0), vec![0, 9]);
    }

    #[test]
    fn keeps_the_farthest_point_when_above_tolerance() {
        let points = [
            Point3::ORIGIN,
            Point3::new(1.0, 0.1, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(3.0, 0.1, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        ];
        assert_eq!(simplify_window(&points, 0.5), vec![0, 2, 4]);
        assert_eq!(simplify_window(&points, 5.0), vec![0, 4]);
    }

    #[test]
    fn measures_deviation_in_3d() {
        let points = [
            Point3::ORIGIN,
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert_eq!(simplify_window(&points, 0.9), vec![0, 1, 2]);
    }

    #[test]
    fn fixed_indices_survive() {
        let buffer = buffer_of(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
        ]);
        let fixed = BTreeSet::from([2, 99]);
        let (result, diag) = downsample_buffer(&buffer, &fixed, DownsampleOptions::new(1.0));
        assert_eq!(
            result.positions(),
            &[
                Point3::ORIGIN,
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(4.0, 0.0, 0.0)
            ]
        );
        assert_eq!(diag.window_count, 2);
        assert_eq!(diag.points_removed, 2);
    }

    #[test]
    fn radii_are_averaged_over_absorbed_nodes() {
        let mut buffer = buffer_of(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
        ]);
        buffer.set_radii(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let (result, _) = downsample_buffer(&buffer, &BTreeSet::new(), DownsampleOptions::new(1.0));
        // Kept 0 and 4; midpoint index 2 is absorbed by both.
        assert_eq!(result.radii().unwrap(), &[2.0, 4.0]);
        assert_eq!(result.tangents().unwrap().len(), 2);
    }

    #[test]
    fn single_node_buffer_is_untouched() {
        let buffer = buffer_of(&[[1.0, 2.0, 3.0]]);
        let (result, diag) = downsample_buffer(&buffer, &BTreeSet::new(), DownsampleOptions::new(1.0));
        assert_eq!(result.len(), 1);
        assert_eq!(diag.points_removed, 0);
    }

    #[test]
    fn negative_or_nan_tolerance_does_not_panic() {
        let buffer = buffer_of(&[[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 0.0, 0.0]]);
        let (a, _) = downsample_buffer(&buffer, &BTreeSet::new(), DownsampleOptions::new(-1.0));
        let (b, _) = downsample_buffer(&buffer, &BTreeSet::new(), DownsampleOptions::new(f64::NAN));
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
    }
}
