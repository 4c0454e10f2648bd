//! Growable point storage with optional per-node attributes.
//!
//! [`PointBuffer`] keeps node coordinates together with the optional parallel
//! attribute sequences a traced path can carry:
//!
//! - radii and tangents, which always travel as a pair ("circles"),
//! - per-node display colors,
//! - per-node scalar values (e.g. sampled intensities).
//!
//! Every populated attribute sequence has exactly one entry per node. All
//! mutating methods validate their arguments before touching any sequence.

use serde::{Deserialize, Serialize};

use crate::error::{PathError, PathResult};

use super::calibration::Calibration;
use super::core::{Point3, Vec3};

/// Capacity reserved by [`PointBuffer::new`].
pub const DEFAULT_RESERVE: usize = 128;

/// Factor by which the reserved capacity grows once exhausted.
pub const GROWTH_FACTOR: f64 = 1.2;

/// Number of nodes on either side used when guessing tangents.
pub const DEFAULT_TANGENT_WINDOW: usize = 2;

/// RGBA color attached to a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl NodeColor {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Radii and tangents, present or absent together.
#[derive(Debug, Clone, PartialEq)]
struct Circles {
    radii: Vec<f64>,
    tangents: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointBuffer {
    calibration: Calibration,
    positions: Vec<Point3>,
    circles: Option<Circles>,
    colors: Option<Vec<Option<NodeColor>>>,
    values: Option<Vec<f32>>,
}

impl PointBuffer {
    #[must_use]
    pub fn new(calibration: Calibration) -> Self {
        Self::with_capacity(calibration, DEFAULT_RESERVE)
    }

    #[must_use]
    pub fn with_capacity(calibration: Calibration, reserve: usize) -> Self {
        Self {
            calibration,
            positions: Vec::with_capacity(reserve),
            circles: None,
            colors: None,
            values: None,
        }
    }

    /// Build a buffer holding exactly `points`.
    #[must_use]
    pub fn from_points(calibration: Calibration, points: &[Point3]) -> Self {
        let mut buffer = Self::with_capacity(calibration, points.len());
        buffer.positions.extend_from_slice(points);
        buffer
    }

    #[must_use]
    pub const fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.positions.capacity()
    }

    #[must_use]
    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    pub fn iter(&self) -> impl Iterator<Item = Point3> + '_ {
        self.positions.iter().copied()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Point3> {
        self.positions.get(index).copied()
    }

    /// Node at `index`, failing when the index is out of range.
    pub fn point(&self, index: usize) -> PathResult<Point3> {
        self.get(index).ok_or(PathError::OutOfRangeIndex {
            index,
            len: self.len(),
        })
    }

    #[must_use]
    pub fn first(&self) -> Option<Point3> {
        self.positions.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<Point3> {
        self.positions.last().copied()
    }

    // ── Structural mutation ─────────────────────────────────────────────────

    /// Append a node. Amortized O(1).
    pub fn push(&mut self, point: Point3) {
        self.grow_for(1);
        let fill_radius = self.last_radius();
        self.positions.push(point);
        if let Some(circles) = self.circles.as_mut() {
            circles.radii.push(fill_radius.unwrap_or_default());
            circles.tangents.push(Vec3::ZERO);
        }
        if let Some(colors) = self.colors.as_mut() {
            colors.push(None);
        }
        if let Some(values) = self.values.as_mut() {
            values.push(0.0);
        }
        self.refresh_tangents_near(self.len() - 1);
    }

    /// Insert a node before `index`; `index == len` appends.
    ///
    /// A newly inserted node takes the mean radius of its neighbours.
    pub fn insert(&mut self, index: usize, point: Point3) -> PathResult<()> {
        let len = self.len();
        if index > len {
            return Err(PathError::OutOfRangeIndex { index, len });
        }
        self.grow_for(1);
        if let Some(circles) = self.circles.as_mut() {
            let before = index.checked_sub(1).and_then(|i| circles.radii.get(i)).copied();
            let after = circles.radii.get(index).copied();
            let radius = match (before, after) {
                (Some(a), Some(b)) => (a + b) / 2.0,
                (Some(r), None) | (None, Some(r)) => r,
                (None, None) => 0.0,
            };
            circles.radii.insert(index, radius);
            circles.tangents.insert(index, Vec3::ZERO);
        }
        self.positions.insert(index, point);
        if let Some(colors) = self.colors.as_mut() {
            colors.insert(index, None);
        }
        if let Some(values) = self.values.as_mut() {
            values.insert(index, 0.0);
        }
        self.refresh_tangents();
        Ok(())
    }

    /// Remove the node at `index` and return it.
    ///
    /// A single-node buffer is never emptied: removing its only node is a
    /// no-op that returns `Ok(None)`.
    pub fn remove(&mut self, index: usize) -> PathResult<Option<Point3>> {
        let len = self.len();
        if index >= len {
            return Err(PathError::OutOfRangeIndex { index, len });
        }
        if len == 1 {
            return Ok(None);
        }
        let removed = self.positions.remove(index);
        if let Some(circles) = self.circles.as_mut() {
            circles.radii.remove(index);
            circles.tangents.remove(index);
        }
        if let Some(colors) = self.colors.as_mut() {
            colors.remove(index);
        }
        if let Some(values) = self.values.as_mut() {
            values.remove(index);
        }
        self.shrink_to_fit();
        self.refresh_tangents();
        Ok(Some(removed))
    }

    /// Move the node at `index` to `point`.
    pub fn set(&mut self, index: usize, point: Point3) -> PathResult<()> {
        let len = self.len();
        let slot = self
            .positions
            .get_mut(index)
            .ok_or(PathError::OutOfRangeIndex { index, len })?;
        *slot = point;
        self.refresh_tangents_near(index);
        Ok(())
    }

    /// Append the nodes of `other`, skipping its first `skip` nodes.
    ///
    /// When `other` carries radii and this buffer does not, every existing
    /// node first receives `2 × min spacing` as radius. Nodes coming from a
    /// radius-less `other` receive the same default when this buffer has radii.
    pub fn append(&mut self, other: &Self, skip: usize) {
        let skip = skip.min(other.len());
        let incoming = other.len() - skip;
        let default_radius = self.default_radius();
        if other.has_radii() && !self.has_radii() {
            log::warn!(
                "appending radius-carrying nodes; backfilling {} existing nodes with radius {default_radius}",
                self.len()
            );
            self.fill_radius(default_radius);
        }
        self.grow_for(incoming);
        self.positions.extend_from_slice(&other.positions[skip..]);
        if let Some(circles) = self.circles.as_mut() {
            match other.circles.as_ref() {
                Some(theirs) => circles.radii.extend_from_slice(&theirs.radii[skip..]),
                None => circles
                    .radii
                    .extend(std::iter::repeat_n(default_radius, incoming)),
            }
            circles
                .tangents
                .extend(std::iter::repeat_n(Vec3::ZERO, incoming));
        }
        let prior = self.positions.len() - incoming;
        if let Some(theirs) = other.colors.as_ref() {
            self.colors
                .get_or_insert_with(|| vec![None; prior])
                .extend_from_slice(&theirs[skip..]);
        } else if let Some(mine) = self.colors.as_mut() {
            mine.extend(std::iter::repeat_n(None, incoming));
        }
        if let Some(theirs) = other.values.as_ref() {
            self.values
                .get_or_insert_with(|| vec![0.0; prior])
                .extend_from_slice(&theirs[skip..]);
        } else if let Some(mine) = self.values.as_mut() {
            mine.extend(std::iter::repeat_n(0.0, incoming));
        }
        self.refresh_tangents();
    }

    /// Number of leading nodes of `other` that coincide exactly with this
    /// buffer's last node.
    #[must_use]
    pub fn leading_duplicates_of(&self, other: &Self) -> usize {
        match self.last() {
            Some(last) => other.positions.iter().take_while(|p| **p == last).count(),
            None => 0,
        }
    }

    /// Copy of this buffer with the node order reversed.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut result = self.clone();
        result.positions.reverse();
        if let Some(circles) = result.circles.as_mut() {
            circles.radii.reverse();
        }
        if let Some(colors) = result.colors.as_mut() {
            colors.reverse();
        }
        if let Some(values) = result.values.as_mut() {
            values.reverse();
        }
        result.refresh_tangents();
        result.shrink_to_fit();
        result
    }

    /// Keep only the nodes at `kept` (strictly increasing original indices),
    /// using `radii` as the radius of each kept node.
    pub(crate) fn select(&self, kept: &[usize], radii: Option<Vec<f64>>) -> Self {
        let positions: Vec<Point3> = kept.iter().map(|&i| self.positions[i]).collect();
        let circles = radii.map(|radii| Circles {
            tangents: vec![Vec3::ZERO; radii.len()],
            radii,
        });
        let colors = self
            .colors
            .as_ref()
            .map(|colors| kept.iter().map(|&i| colors[i]).collect());
        let values = self
            .values
            .as_ref()
            .map(|values| kept.iter().map(|&i| values[i]).collect());
        let mut result = Self {
            calibration: self.calibration.clone(),
            positions,
            circles,
            colors,
            values,
        };
        result.refresh_tangents();
        result
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Index of the node closest to `target` and strictly closer than
    /// `within`. Ties resolve to the lowest index; a negative `within`
    /// matches nothing.
    #[must_use]
    pub fn nearest_index(&self, target: Point3, within: f64) -> Option<usize> {
        if within < 0.0 {
            return None;
        }
        let mut best_distance_sq = within * within;
        let mut best = None;
        for (i, p) in self.positions.iter().enumerate() {
            let distance_sq = p.distance_squared_to(target);
            if distance_sq < best_distance_sq {
                best = Some(i);
                best_distance_sq = distance_sq;
            }
        }
        best
    }

    /// Like [`nearest_index`](Self::nearest_index) without a search radius.
    #[must_use]
    pub fn nearest_index_unbounded(&self, target: Point3) -> Option<usize> {
        self.nearest_index(target, f64::INFINITY)
    }

    /// First node lying within one voxel of `target` on every axis.
    #[must_use]
    pub fn node_index_within_spacing(&self, target: Point3) -> Option<usize> {
        let cal = &self.calibration;
        self.positions.iter().position(|p| {
            (p.x - target.x).abs() < cal.x_spacing()
                && (p.y - target.y).abs() < cal.y_spacing()
                && (p.z - target.z).abs() < cal.z_spacing()
        })
    }

    /// Exact membership test.
    #[must_use]
    pub fn contains(&self, target: Point3) -> bool {
        self.positions.contains(&target)
    }

    /// Sum of consecutive segment lengths.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.positions
            .windows(2)
            .map(|pair| pair[0].distance_to(pair[1]))
            .sum()
    }

    /// Pixel coordinates of the node at `index`, shifted by `offset`.
    pub fn unscaled(&self, index: usize, offset: Vec3) -> PathResult<Point3> {
        let point = self.point(index)?;
        Ok(self.calibration.to_unscaled(point, offset))
    }

    /// [`unscaled`](Self::unscaled), rounded to whole pixels.
    pub fn unscaled_rounded(&self, index: usize, offset: Vec3) -> PathResult<[i64; 3]> {
        let p = self.unscaled(index, offset)?;
        #[allow(clippy::cast_possible_truncation)]
        let rounded = [p.x.round() as i64, p.y.round() as i64, p.z.round() as i64];
        Ok(rounded)
    }

    // ── Radii and tangents ──────────────────────────────────────────────────

    #[must_use]
    pub fn has_radii(&self) -> bool {
        self.circles.is_some()
    }

    #[must_use]
    pub fn radii(&self) -> Option<&[f64]> {
        self.circles.as_ref().map(|c| c.radii.as_slice())
    }

    #[must_use]
    pub fn tangents(&self) -> Option<&[Vec3]> {
        self.circles.as_ref().map(|c| c.tangents.as_slice())
    }

    /// Radius of the node at `index`, or `0.0` when no radii are defined.
    pub fn radius(&self, index: usize) -> PathResult<f64> {
        self.point(index)?;
        Ok(self.radii().map_or(0.0, |radii| radii[index]))
    }

    /// Tangent of the node at `index`.
    pub fn tangent(&self, index: usize) -> PathResult<Vec3> {
        self.point(index)?;
        self.tangents()
            .map(|tangents| tangents[index])
            .ok_or(PathError::DegenerateRadiusState)
    }

    /// Assign `radius` to every node. `0.0` or NaN removes radii altogether.
    pub fn set_radius(&mut self, radius: f64) -> PathResult<()> {
        if radius.is_nan() || radius == 0.0 {
            self.circles = None;
            return Ok(());
        }
        if !radius.is_finite() || radius < 0.0 {
            return Err(PathError::InvalidRadius(radius));
        }
        self.fill_radius(radius);
        Ok(())
    }

    /// Assign one radius per node. An empty slice removes radii.
    pub fn set_radii(&mut self, radii: &[f64]) -> PathResult<()> {
        if radii.is_empty() {
            self.circles = None;
            return Ok(());
        }
        if radii.len() != self.len() {
            return Err(PathError::ShapeMismatch {
                attribute: "radii",
                expected: self.len(),
                actual: radii.len(),
            });
        }
        if let Some(bad) = radii.iter().find(|r| !r.is_finite() || **r < 0.0) {
            return Err(PathError::InvalidRadius(*bad));
        }
        self.circles = Some(Circles {
            radii: radii.to_vec(),
            tangents: vec![Vec3::ZERO; radii.len()],
        });
        self.refresh_tangents();
        Ok(())
    }

    /// Arithmetic mean of the radii, `0.0` without radii.
    #[must_use]
    pub fn mean_radius(&self) -> f64 {
        match self.radii() {
            Some(radii) if !radii.is_empty() => radii.iter().sum::<f64>() / radii.len() as f64,
            _ => 0.0,
        }
    }

    /// Recompute every tangent as the difference between the nodes
    /// `window` positions ahead and behind, clamped at the ends.
    pub fn guess_tangents(&mut self, window: usize) -> PathResult<()> {
        let tangents: Vec<Vec3> = (0..self.len())
            .map(|i| self.tangent_at(i, window))
            .collect();
        let circles = self
            .circles
            .as_mut()
            .ok_or(PathError::DegenerateRadiusState)?;
        circles.tangents = tangents;
        Ok(())
    }

    /// Central-difference tangent estimate at `index` (not normalized).
    pub fn tangent_estimate(&self, index: usize, window: usize) -> PathResult<Vec3> {
        self.point(index)?;
        Ok(self.tangent_at(index, window))
    }

    /// `index` must be in range.
    fn tangent_at(&self, index: usize, window: usize) -> Vec3 {
        let last = self.len().saturating_sub(1);
        let min_index = index.saturating_sub(window);
        let max_index = index.saturating_add(window).min(last);
        self.positions[max_index].sub_point(self.positions[min_index])
    }

    /// Default radius for nodes that never had one: twice the smallest spacing.
    #[must_use]
    pub fn default_radius(&self) -> f64 {
        2.0 * self.calibration.min_separation()
    }

    // ── Colors and values ───────────────────────────────────────────────────

    #[must_use]
    pub fn has_node_colors(&self) -> bool {
        self.colors.is_some()
    }

    #[must_use]
    pub fn node_colors(&self) -> Option<&[Option<NodeColor>]> {
        self.colors.as_deref()
    }

    /// Replace all node colors. `None` falls back to the path color.
    pub fn set_node_colors(&mut self, colors: Option<Vec<Option<NodeColor>>>) -> PathResult<()> {
        if let Some(colors) = colors.as_ref() {
            self.check_shape("colors", colors.len())?;
        }
        self.colors = colors;
        Ok(())
    }

    pub fn set_node_color(&mut self, index: usize, color: Option<NodeColor>) -> PathResult<()> {
        self.point(index)?;
        let len = self.len();
        self.colors.get_or_insert_with(|| vec![None; len])[index] = color;
        Ok(())
    }

    #[must_use]
    pub fn node_color(&self, index: usize) -> Option<NodeColor> {
        self.colors.as_ref().and_then(|c| c.get(index).copied().flatten())
    }

    #[must_use]
    pub fn values(&self) -> Option<&[f32]> {
        self.values.as_deref()
    }

    pub fn set_values(&mut self, values: Option<Vec<f32>>) -> PathResult<()> {
        if let Some(values) = values.as_ref() {
            self.check_shape("values", values.len())?;
        }
        self.values = values;
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: f32) -> PathResult<()> {
        self.point(index)?;
        let len = self.len();
        self.values.get_or_insert_with(|| vec![0.0; len])[index] = value;
        Ok(())
    }

    #[must_use]
    pub fn value(&self, index: usize) -> Option<f32> {
        self.values.as_ref().and_then(|v| v.get(index).copied())
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn check_shape(&self, attribute: &'static str, actual: usize) -> PathResult<()> {
        if actual == self.len() {
            Ok(())
        } else {
            Err(PathError::ShapeMismatch {
                attribute,
                expected: self.len(),
                actual,
            })
        }
    }

    fn last_radius(&self) -> Option<f64> {
        self.radii().and_then(|radii| radii.last().copied())
    }

    fn fill_radius(&mut self, radius: f64) {
        let len = self.len();
        match self.circles.as_mut() {
            Some(circles) => circles.radii.iter_mut().for_each(|r| *r = radius),
            None => {
                let mut radii = Vec::with_capacity(self.positions.capacity());
                radii.resize(len, radius);
                let mut tangents = Vec::with_capacity(self.positions.capacity());
                tangents.resize(len, Vec3::ZERO);
                self.circles = Some(Circles { radii, tangents });
            }
        }
        self.refresh_tangents();
    }

    fn refresh_tangents(&mut self) {
        if self.circles.is_some() {
            // Only fails without circles, checked above.
            let _ = self.guess_tangents(DEFAULT_TANGENT_WINDOW);
        }
    }

    /// Recompute only the tangents whose window covers `index`.
    fn refresh_tangents_near(&mut self, index: usize) {
        if self.circles.is_none() || self.is_empty() {
            return;
        }
        let last = self.len() - 1;
        let lo = index.saturating_sub(DEFAULT_TANGENT_WINDOW);
        let hi = index.saturating_add(DEFAULT_TANGENT_WINDOW).min(last);
        let updated: Vec<Vec3> = (lo..=hi)
            .map(|i| self.tangent_at(i, DEFAULT_TANGENT_WINDOW))
            .collect();
        if let Some(circles) = self.circles.as_mut() {
            circles.tangents[lo..=hi].copy_from_slice(&updated);
        }
    }

    /// Grow every populated sequence by [`GROWTH_FACTOR`] when `additional`
    /// nodes no longer fit.
    fn grow_for(&mut self, additional: usize) {
        let needed = self.len() + additional;
        let capacity = self.capacity();
        if needed <= capacity {
            return;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let grown = (capacity as f64 * GROWTH_FACTOR) as usize + 1;
        let extra = grown.max(needed) - self.len();
        self.positions.reserve_exact(extra);
        if let Some(circles) = self.circles.as_mut() {
            circles.radii.reserve_exact(extra);
            circles.tangents.reserve_exact(extra);
        }
        if let Some(colors) = self.colors.as_mut() {
            colors.reserve_exact(extra);
        }
        if let Some(values) = self.values.as_mut() {
            values.reserve_exact(extra);
        }
    }

    fn shrink_to_fit(&mut self) {
        self.positions.shrink_to_fit();
        if let Some(circles) = self.circles.as_mut() {
            circles.radii.shrink_to_fit();
            circles.tangents.shrink_to_fit();
        }
        if let Some(colors) = self.colors.as_mut() {
            colors.shrink_to_fit();
        }
        if let Some(values) = self.values.as_mut() {
            values.shrink_to_fit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> PointBuffer {
        let mut buffer = PointBuffer::new(Calibration::unit_pixels());
        for i in 0..n {
            buffer.push(Point3::new(i as f64, 0.0, 0.0));
        }
        buffer
    }

    #[test]
    fn nearest_index_respects_search_radius() {
        let buffer = line(3);
        assert_eq!(buffer.nearest_index(Point3::new(1.4, 0.0, 0.0), 1.0), Some(1));
        assert_eq!(buffer.nearest_index(Point3::new(5.0, 0.0, 0.0), 0.5), None);
        assert_eq!(buffer.nearest_index_unbounded(Point3::new(50.0, 0.0, 0.0)), Some(2));
    }

    #[test]
    fn nearest_index_prefers_lowest_index_on_ties() {
        let buffer = line(3);
        assert_eq!(buffer.nearest_index(Point3::new(0.5, 0.0, 0.0), 1.0), Some(0));
    }

    #[test]
    fn length_sums_segments() {
        assert!((line(3).length() - 2.0).abs() < 1e-12);
        assert_eq!(line(1).length(), 0.0);
    }

    #[test]
    fn growth_preserves_attributes() {
        let mut buffer = PointBuffer::with_capacity(Calibration::unit_pixels(), 2);
        buffer.push(Point3::new(0.0, 0.0, 0.0));
        buffer.push(Point3::new(1.0, 0.0, 0.0));
        buffer.set_radii(&[1.0, 2.0]).unwrap();
        buffer.set_value(1, 7.5).unwrap();
        for i in 2..10 {
            buffer.push(Point3::new(i as f64, 0.0, 0.0));
        }
        assert_eq!(buffer.len(), 10);
        assert!(buffer.capacity() >= 10);
        assert_eq!(buffer.radii().unwrap().len(), 10);
        assert_eq!(buffer.tangents().unwrap().len(), 10);
        assert_eq!(buffer.values().unwrap().len(), 10);
        assert_eq!(buffer.radius(1).unwrap(), 2.0);
        assert_eq!(buffer.value(1), Some(7.5));
    }

    #[test]
    fn insert_and_remove_validate_indices() {
        let mut buffer = line(3);
        assert!(matches!(
            buffer.insert(4, Point3::ORIGIN),
            Err(PathError::OutOfRangeIndex { index: 4, len: 3 })
        ));
        buffer.insert(3, Point3::new(3.0, 0.0, 0.0)).unwrap();
        assert_eq!(buffer.len(), 4);
        assert!(buffer.remove(4).is_err());
        assert_eq!(buffer.remove(0).unwrap(), Some(Point3::ORIGIN));
        assert_eq!(buffer.first(), Some(Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn removing_the_only_node_is_a_no_op() {
        let mut buffer = line(1);
        assert_eq!(buffer.remove(0).unwrap(), None);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn inserted_node_interpolates_radius() {
        let mut buffer = line(2);
        buffer.set_radii(&[1.0, 3.0]).unwrap();
        buffer.insert(1, Point3::new(0.5, 0.0, 0.0)).unwrap();
        assert_eq!(buffer.radii().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn radii_and_tangents_are_co_present() {
        let mut buffer = line(4);
        assert!(buffer.tangents().is_none());
        assert!(matches!(buffer.tangent(0), Err(PathError::DegenerateRadiusState)));
        assert!(matches!(
            buffer.guess_tangents(2),
            Err(PathError::DegenerateRadiusState)
        ));

        buffer.set_radius(0.5).unwrap();
        assert!(buffer.has_radii());
        assert_eq!(buffer.tangent(1).unwrap(), Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(buffer.tangent(0).unwrap(), Vec3::new(2.0, 0.0, 0.0));

        buffer.set_radius(f64::NAN).unwrap();
        assert!(!buffer.has_radii());
        assert!(buffer.tangents().is_none());
    }

    #[test]
    fn set_radii_rejects_shape_mismatch() {
        let mut buffer = line(3);
        let err = buffer.set_radii(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            PathError::ShapeMismatch {
                attribute: "radii",
                expected: 3,
                actual: 2
            }
        );
        assert!(!buffer.has_radii());
        assert!(matches!(buffer.set_radius(-1.0), Err(PathError::InvalidRadius(_))));
    }

    #[test]
    fn node_colors_allocate_lazily() {
        let mut buffer = line(3);
        assert!(!buffer.has_node_colors());
        buffer.set_node_color(2, Some(NodeColor::rgb(255, 0, 0))).unwrap();
        assert_eq!(buffer.node_color(2), Some(NodeColor::rgb(255, 0, 0)));
        assert_eq!(buffer.node_color(0), None);
        assert!(buffer.set_node_colors(Some(vec![None])).is_err());
        assert!(buffer.has_node_colors());
    }

    #[test]
    fn append_skips_and_backfills_radii() {
        let mut a = line(3);
        let mut b = PointBuffer::new(Calibration::new(0.5, 1.0, 1.0, "um").unwrap());
        b.push(Point3::new(2.0, 0.0, 0.0));
        b.push(Point3::new(3.0, 0.0, 0.0));
        b.set_radius(4.0).unwrap();

        let skip = a.leading_duplicates_of(&b);
        assert_eq!(skip, 1);
        a.append(&b, skip);

        assert_eq!(a.len(), 4);
        assert_eq!(a.radii().unwrap(), &[2.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn reversed_reverses_attributes() {
        let mut buffer = line(3);
        buffer.set_radii(&[1.0, 2.0, 3.0]).unwrap();
        let reversed = buffer.reversed();
        assert_eq!(reversed.first(), Some(Point3::new(2.0, 0.0, 0.0)));
        assert_eq!(reversed.radii().unwrap(), &[3.0, 2.0, 1.0]);
        assert_eq!(reversed.tangent(1).unwrap(), Vec3::new(-2.0, 0.0, 0.0));
    }

    #[test]
    fn node_index_within_spacing_uses_voxel_box() {
        let buffer = line(3);
        assert_eq!(buffer.node_index_within_spacing(Point3::new(1.2, 0.5, 0.0)), Some(1));
        assert_eq!(buffer.node_index_within_spacing(Point3::new(1.2, 1.5, 0.0)), None);
        assert!(buffer.contains(Point3::new(2.0, 0.0, 0.0)));
        assert!(!buffer.contains(Point3::new(2.5, 0.0, 0.0)));
    }

    #[test]
    fn unscaled_rounds_pixel_coordinates() {
        let mut buffer = PointBuffer::new(Calibration::new(0.5, 0.5, 2.0, "um").unwrap());
        buffer.push(Point3::new(1.2, 0.6, 3.0));
        assert_eq!(buffer.unscaled_rounded(0, Vec3::ZERO).unwrap(), [2, 1, 2]);
        assert!(buffer.unscaled(1, Vec3::ZERO).is_err());
    }

    #[test]
    fn local_tangent_refresh_matches_full_recompute() {
        let mut buffer = line(3);
        buffer.set_radius(1.0).unwrap();
        for i in 3..12 {
            let i = f64::from(i);
            buffer.push(Point3::new(i, (i * 0.7).sin(), i * i * 0.1));
        }
        buffer.set(5, Point3::new(4.0, 3.0, -1.0)).unwrap();
        buffer.set(0, Point3::new(-2.0, 1.0, 0.0)).unwrap();

        let mut expected = buffer.clone();
        expected.guess_tangents(DEFAULT_TANGENT_WINDOW).unwrap();
        assert_eq!(buffer.tangents(), expected.tangents());
    }

    #[test]
    fn tangent_estimate_rejects_bad_indices_and_huge_windows() {
        let mut buffer = line(3);
        assert!(matches!(
            buffer.tangent_estimate(8, 2),
            Err(PathError::OutOfRangeIndex { index: 8, len: 3 })
        ));
        assert_eq!(
            buffer.tangent_estimate(1, usize::MAX).unwrap(),
            Vec3::new(2.0, 0.0, 0.0)
        );
        buffer.set_radius(1.0).unwrap();
        buffer.guess_tangents(usize::MAX).unwrap();
        assert_eq!(buffer.tangent(2).unwrap(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn negative_search_radius_finds_nothing() {
        let buffer = line(3);
        assert_eq!(buffer.nearest_index(Point3::new(1.0, 0.0, 0.0), -1.0), None);
        assert_eq!(buffer.nearest_index(Point3::new(1.0, 0.0, 0.0), f64::NAN), None);
    }
}
