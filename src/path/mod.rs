//! A single traced path: geometry, identity and classification.
//!
//! A [`Path`] owns one [`PointBuffer`] plus the bookkeeping needed to place
//! it in a tree of paths. Join slots are only written through
//! [`PathSet`](crate::graph::PathSet), which keeps both sides of every join
//! consistent; a path on its own can be edited, measured, reversed and
//! transformed.

pub mod fitted;
pub mod swc;

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt;

use crate::error::{PathError, PathResult};
use crate::geom::{
    Calibration, DownsampleDiagnostics, DownsampleOptions, NodeColor, Point3, PointBuffer,
    PointTransformer, Vec3, downsample_buffer,
};
use crate::graph::id::PathId;
use crate::graph::join::{Join, JoinEnd, JoinState};

use fitted::{FittedPath, PathView};
use swc::SwcType;

/// Order of a root path.
pub const ROOT_ORDER: usize = 1;

#[derive(Debug, Clone)]
pub struct Path {
    id: Option<PathId>,
    name: Option<String>,
    swc_type: SwcType,
    selected: bool,
    editable_node: Option<usize>,
    primary: bool,
    order: usize,
    points: PointBuffer,
    pub(crate) start_join: Option<Join>,
    pub(crate) end_join: Option<Join>,
    pub(crate) somehow_joins: BTreeSet<PathId>,
    pub(crate) children: Vec<PathId>,
    fitted: Option<FittedPath>,
    use_fitted: bool,
    render_dirty: bool,
}

impl Path {
    /// Empty path with the default reserved capacity.
    #[must_use]
    pub fn new(calibration: Calibration) -> Self {
        Self::from_buffer(PointBuffer::new(calibration))
    }

    #[must_use]
    pub fn with_reserve(calibration: Calibration, reserve: usize) -> Self {
        Self::from_buffer(PointBuffer::with_capacity(calibration, reserve))
    }

    /// Path over an existing buffer.
    #[must_use]
    pub fn from_buffer(points: PointBuffer) -> Self {
        Self {
            id: None,
            name: None,
            swc_type: SwcType::Undefined,
            selected: false,
            editable_node: None,
            primary: false,
            order: ROOT_ORDER,
            points,
            start_join: None,
            end_join: None,
            somehow_joins: BTreeSet::new(),
            children: Vec::new(),
            fitted: None,
            use_fitted: false,
            render_dirty: true,
        }
    }

    /// Path through `points`.
    #[must_use]
    pub fn from_points(calibration: Calibration, points: &[Point3]) -> Self {
        Self::from_buffer(PointBuffer::from_points(calibration, points))
    }

    // ── Identity and classification ─────────────────────────────────────────

    #[must_use]
    pub const fn id(&self) -> Option<PathId> {
        self.id
    }

    /// Assign the identifier. Only the owning set does this, exactly once.
    pub(crate) fn set_id(&mut self, id: PathId) -> PathResult<()> {
        if let Some(existing) = self.id {
            return Err(PathError::IdAlreadyAssigned(existing));
        }
        self.id = Some(id);
        Ok(())
    }

    /// Display name, defaulting to `"Path <id>"`.
    #[must_use]
    pub fn name(&self) -> String {
        match (&self.name, self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(PathId(id))) => format!("Path {id}"),
            (None, None) => "Path".to_owned(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    #[must_use]
    pub const fn swc_type(&self) -> SwcType {
        self.swc_type
    }

    /// Set the type tag on this path and its fitted version.
    pub fn set_swc_type(&mut self, swc_type: SwcType) {
        self.swc_type = swc_type;
        if let Some(fitted) = self.fitted.as_mut() {
            fitted.sync_swc_type(swc_type);
        }
        self.render_dirty = true;
    }

    #[must_use]
    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    #[must_use]
    pub const fn editable_node(&self) -> Option<usize> {
        self.editable_node
    }

    /// Mark the node at `index` as being edited, or clear the mark.
    pub fn set_editable_node(&mut self, index: Option<usize>) -> PathResult<()> {
        if let Some(index) = index {
            self.points.point(index)?;
        }
        self.editable_node = index;
        Ok(())
    }

    #[must_use]
    pub const fn is_being_edited(&self) -> bool {
        self.editable_node.is_some()
    }

    pub fn stop_being_edited(&mut self) {
        self.editable_node = None;
    }

    // ── Branch order ────────────────────────────────────────────────────────

    /// Reverse Horton–Strahler order; `1` for roots.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Set the order here and on the fitted version.
    pub(crate) fn set_order(&mut self, order: usize) {
        let order = order.max(ROOT_ORDER);
        self.order = order;
        if let Some(fitted) = self.fitted.as_mut() {
            fitted.sync_order(order);
        }
    }

    /// Root path: explicitly primary, or of order 1.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.primary || self.order == ROOT_ORDER
    }

    /// Mark the path as a root. Marking forces order 1.
    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
        if primary {
            self.set_order(ROOT_ORDER);
        }
    }

    pub(crate) const fn is_marked_primary(&self) -> bool {
        self.primary
    }

    // ── Joins (read side) ───────────────────────────────────────────────────

    #[must_use]
    pub const fn start_join(&self) -> Option<&Join> {
        self.start_join.as_ref()
    }

    #[must_use]
    pub const fn end_join(&self) -> Option<&Join> {
        self.end_join.as_ref()
    }

    #[must_use]
    pub const fn join(&self, end: JoinEnd) -> Option<&Join> {
        match end {
            JoinEnd::Start => self.start_join.as_ref(),
            JoinEnd::End => self.end_join.as_ref(),
        }
    }

    pub(crate) fn join_slot(&mut self, end: JoinEnd) -> &mut Option<Join> {
        match end {
            JoinEnd::Start => &mut self.start_join,
            JoinEnd::End => &mut self.end_join,
        }
    }

    #[must_use]
    pub const fn join_state(&self) -> JoinState {
        JoinState::from_slots(self.start_join.is_some(), self.end_join.is_some())
    }

    /// Every path connected to this one by any join.
    #[must_use]
    pub const fn somehow_joins(&self) -> &BTreeSet<PathId> {
        &self.somehow_joins
    }

    /// Children assigned by the last tree construction.
    #[must_use]
    pub fn children(&self) -> &[PathId] {
        &self.children
    }

    /// True when either end of this path is joined onto `other`.
    #[must_use]
    pub fn joins_onto(&self, other: PathId) -> bool {
        [self.start_join, self.end_join]
            .iter()
            .flatten()
            .any(|join| join.target == other)
    }

    // ── Geometry ────────────────────────────────────────────────────────────

    #[must_use]
    pub const fn points(&self) -> &PointBuffer {
        &self.points
    }

    #[must_use]
    pub const fn calibration(&self) -> &Calibration {
        self.points.calibration()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, index: usize) -> PathResult<Point3> {
        self.points.point(index)
    }

    /// Closest node strictly within `within`, lowest index on ties.
    #[must_use]
    pub fn nearest_index(&self, target: Point3, within: f64) -> Option<usize> {
        self.points.nearest_index(target, within)
    }

    #[must_use]
    pub fn contains(&self, target: Point3) -> bool {
        self.points.contains(target)
    }

    /// Smallest calibration spacing.
    #[must_use]
    pub fn min_separation(&self) -> f64 {
        self.calibration().min_separation()
    }

    /// Append a node at the end.
    pub fn add_node(&mut self, point: Point3) {
        self.points.push(point);
        self.render_dirty = true;
    }

    /// Insert a node before `index`.
    pub fn insert_node(&mut self, index: usize, point: Point3) -> PathResult<()> {
        self.points.insert(index, point)?;
        self.render_dirty = true;
        Ok(())
    }

    /// Remove the node at `index`.
    ///
    /// A join point that coincided with the removed node moves to the new
    /// first (start join) or last (end join) node.
    pub fn remove_node(&mut self, index: usize) -> PathResult<Option<Point3>> {
        let removed = self.points.remove(index)?;
        let Some(point) = removed else {
            return Ok(None);
        };
        let (first, last) = (self.points.first(), self.points.last());
        if let Some(join) = self.start_join.as_mut().filter(|j| j.point == point) {
            join.point = first.unwrap_or(point);
        }
        if let Some(join) = self.end_join.as_mut().filter(|j| j.point == point) {
            join.point = last.unwrap_or(point);
        }
        if self.editable_node.is_some_and(|i| i >= self.points.len()) {
            self.editable_node = None;
        }
        self.render_dirty = true;
        Ok(Some(point))
    }

    pub fn move_node(&mut self, index: usize, point: Point3) -> PathResult<()> {
        self.points.set(index, point)?;
        self.render_dirty = true;
        Ok(())
    }

    pub fn set_node_colors(&mut self, colors: Option<Vec<Option<NodeColor>>>) -> PathResult<()> {
        self.points.set_node_colors(colors)?;
        self.render_dirty = true;
        Ok(())
    }

    pub fn set_node_color(&mut self, index: usize, color: Option<NodeColor>) -> PathResult<()> {
        self.points.set_node_color(index, color)?;
        self.render_dirty = true;
        Ok(())
    }

    pub fn set_values(&mut self, values: Option<Vec<f32>>) -> PathResult<()> {
        self.points.set_values(values)
    }

    pub(crate) fn points_mut(&mut self) -> &mut PointBuffer {
        self.render_dirty = true;
        &mut self.points
    }

    // ── Radii ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn has_radii(&self) -> bool {
        self.points.has_radii()
    }

    pub fn set_radius(&mut self, radius: f64) -> PathResult<()> {
        self.points.set_radius(radius)?;
        self.render_dirty = true;
        Ok(())
    }

    pub fn set_radii(&mut self, radii: &[f64]) -> PathResult<()> {
        self.points.set_radii(radii)?;
        self.render_dirty = true;
        Ok(())
    }

    pub fn node_radius(&self, index: usize) -> PathResult<f64> {
        self.points.radius(index)
    }

    pub fn tangent(&self, index: usize) -> PathResult<Vec3> {
        self.points.tangent(index)
    }

    pub fn guess_tangents(&mut self, window: usize) -> PathResult<()> {
        self.points.guess_tangents(window)
    }

    // ── Measurements ────────────────────────────────────────────────────────

    /// Sum of the segment lengths.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.points.length()
    }

    #[must_use]
    pub fn mean_radius(&self) -> f64 {
        self.points.mean_radius()
    }

    /// Sum of the frustum volumes between consecutive nodes, or `-1.0`
    /// when the path has no radii.
    #[must_use]
    pub fn approximate_volume(&self) -> f64 {
        let Some(radii) = self.points.radii() else {
            return -1.0;
        };
        self.points
            .positions()
            .windows(2)
            .zip(radii.windows(2))
            .map(|(p, r)| {
                let h = p[0].distance_to(p[1]);
                PI * h * (r[0] * r[0] + r[1] * r[1] + r[0] * r[1]) / 3.0
            })
            .sum()
    }

    // ── Derived paths ───────────────────────────────────────────────────────

    /// New path with the node order reversed.
    ///
    /// Joins, identity and the fitted version are not carried over.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut result = Self::from_buffer(self.points.reversed());
        result.swc_type = self.swc_type;
        result
    }

    /// New path with every node mapped through `transformer`, expressed in
    /// `calibration`.
    ///
    /// Nodes whose image is not finite are dropped. Identity, name, selection
    /// and type carry over; joins, radii and the fitted version do not.
    #[must_use]
    pub fn transform<T>(&self, transformer: &T, calibration: Calibration) -> Self
    where
        T: PointTransformer + ?Sized,
    {
        let mut buffer = PointBuffer::with_capacity(calibration, self.size());
        let mut dropped = 0usize;
        for point in self.points.iter() {
            let mapped = transformer.transform_point(point);
            if mapped.is_finite() {
                buffer.push(mapped);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!(
                "transform of {} dropped {dropped} of {} nodes with non-finite coordinates",
                self.name(),
                self.size()
            );
        }
        let mut result = Self::from_buffer(buffer);
        result.id = self.id;
        result.name.clone_from(&self.name);
        result.selected = self.selected;
        result.swc_type = self.swc_type;
        result
    }

    /// Downsample this path keeping the nodes at `fixed`.
    ///
    /// [`PathSet::downsample`](crate::graph::PathSet::downsample) derives the
    /// fixed indices from the joins; this entry point is for callers that
    /// know them already.
    pub fn downsample_with_fixed(
        &mut self,
        fixed: &BTreeSet<usize>,
        options: DownsampleOptions,
    ) -> DownsampleDiagnostics {
        let (points, diagnostics) = downsample_buffer(&self.points, fixed, options);
        self.points = points;
        if self
            .editable_node
            .is_some_and(|index| index >= self.points.len())
        {
            self.editable_node = None;
        }
        self.render_dirty = true;
        log::debug!(
            "downsampled {}: {} -> {} nodes over {} windows",
            self.name(),
            diagnostics.input_point_count,
            diagnostics.output_point_count,
            diagnostics.window_count
        );
        diagnostics
    }

    // ── Fitted version ──────────────────────────────────────────────────────

    /// Attach a refined version of this path. Fails if one is attached.
    pub fn set_fitted(&mut self, points: PointBuffer) -> PathResult<()> {
        if self.fitted.is_some() {
            return Err(PathError::FittedAlreadySet);
        }
        self.fitted = Some(FittedPath::new(points, self.swc_type, self.order));
        Ok(())
    }

    /// Detach the refined version and switch back to the raw one.
    pub fn clear_fitted(&mut self) -> Option<PointBuffer> {
        self.use_fitted = false;
        self.render_dirty = true;
        self.fitted.take().map(FittedPath::into_points)
    }

    #[must_use]
    pub const fn fitted(&self) -> Option<&FittedPath> {
        self.fitted.as_ref()
    }

    #[must_use]
    pub const fn use_fitted(&self) -> bool {
        self.use_fitted
    }

    /// Select which representation is in use.
    pub fn set_use_fitted(&mut self, use_fitted: bool) -> PathResult<()> {
        if use_fitted && self.fitted.is_none() {
            return Err(PathError::NoFittedVersion);
        }
        self.use_fitted = use_fitted;
        self.render_dirty = true;
        Ok(())
    }

    /// The representation currently in use.
    #[must_use]
    pub fn view_in_use(&self) -> PathView<'_> {
        match (&self.fitted, self.use_fitted) {
            (Some(refined), true) => PathView::Fitted { raw: self, refined },
            _ => PathView::Raw(self),
        }
    }

    // ── Rendering hooks ─────────────────────────────────────────────────────

    #[must_use]
    pub const fn is_render_dirty(&self) -> bool {
        self.render_dirty
    }

    /// Return and clear the render-dirty flag.
    pub fn take_render_dirty(&mut self) -> bool {
        std::mem::take(&mut self.render_dirty)
    }

    /// Name decorated with `[Single Point]` and the type tag.
    #[must_use]
    pub fn display_label(&self) -> String {
        display_label(&self.name(), self.size(), self.swc_type)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.view_in_use())
    }
}

pub(crate) fn display_label(name: &str, size: usize, swc_type: SwcType) -> String {
    let mut label = name.to_owned();
    if size == 1 {
        label.push_str(" [Single Point]");
    }
    if swc_type != SwcType::Undefined {
        label.push_str(" [");
        label.push_str(swc_type.label());
        label.push(']');
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Transform;

    fn straight(n: usize) -> Path {
        let points: Vec<Point3> = (0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        Path::from_points(Calibration::unit_pixels(), &points)
    }

    #[test]
    fn test_three_node_scenario() {
        let path = straight(3);
        assert!((path.length() - 2.0).abs() < 1e-12);
        assert_eq!(path.nearest_index(Point3::new(1.4, 0.0, 0.0), 1.0), Some(1));
        assert_eq!(path.nearest_index(Point3::new(5.0, 0.0, 0.0), 0.5), None);
    }

    #[test]
    fn test_volume_sentinel_and_frustum() {
        let mut path = straight(3);
        assert_eq!(path.approximate_volume(), -1.0);
        path.set_radius(1.0).unwrap();
        // Two unit cylinders.
        assert!((path.approximate_volume() - 2.0 * PI).abs() < 1e-9);
        assert!((path.mean_radius() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_name_uses_id() {
        let mut path = straight(2);
        assert_eq!(path.name(), "Path");
        path.set_id(PathId(7)).unwrap();
        assert_eq!(path.name(), "Path 7");
        assert_eq!(
            path.set_id(PathId(8)),
            Err(PathError::IdAlreadyAssigned(PathId(7)))
        );
        path.set_name("apical trunk");
        assert_eq!(path.name(), "apical trunk");
    }

    #[test]
    fn test_display_label_decorations() {
        let mut path = straight(1);
        path.set_id(PathId(2)).unwrap();
        assert_eq!(path.to_string(), "Path 2 [Single Point]");
        path.add_node(Point3::new(1.0, 0.0, 0.0));
        path.set_swc_type(SwcType::Axon);
        assert_eq!(path.display_label(), "Path 2 [axon]");
    }

    #[test]
    fn test_remove_node_resnaps_join_points() {
        let mut path = straight(4);
        path.start_join = Some(Join::new(PathId(1), Point3::ORIGIN));
        path.end_join = Some(Join::new(PathId(2), Point3::new(3.0, 0.0, 0.0)));

        path.remove_node(0).unwrap();
        assert_eq!(path.start_join().unwrap().point, Point3::new(1.0, 0.0, 0.0));

        path.remove_node(2).unwrap();
        assert_eq!(path.end_join().unwrap().point, Point3::new(2.0, 0.0, 0.0));
        assert_eq!(path.size(), 2);
    }

    #[test]
    fn test_remove_node_rejects_out_of_range() {
        let mut path = straight(2);
        assert!(matches!(
            path.remove_node(5),
            Err(PathError::OutOfRangeIndex { index: 5, len: 2 })
        ));
        assert_eq!(path.size(), 2);
    }

    #[test]
    fn test_reversed_keeps_type_drops_joins() {
        let mut path = straight(3);
        path.set_swc_type(SwcType::Dendrite);
        path.end_join = Some(Join::new(PathId(4), Point3::new(2.0, 0.0, 0.0)));
        let reversed = path.reversed();
        assert_eq!(reversed.point(0).unwrap(), Point3::new(2.0, 0.0, 0.0));
        assert_eq!(reversed.swc_type(), SwcType::Dendrite);
        assert_eq!(reversed.join_state(), JoinState::Unjoined);
        assert_eq!(reversed.id(), None);
    }

    #[test]
    fn test_transform_drops_non_finite_nodes() {
        let mut path = straight(3);
        path.set_id(PathId(3)).unwrap();
        path.set_selected(true);
        let target = Calibration::new(0.5, 0.5, 1.0, "um").unwrap();
        let moved = path.transform(&Transform::translate(Vec3::new(0.0, 1.0, 0.0)), target.clone());
        assert_eq!(moved.point(2).unwrap(), Point3::new(2.0, 1.0, 0.0));
        assert_eq!(moved.calibration(), &target);
        assert_eq!(moved.id(), Some(PathId(3)));
        assert!(moved.is_selected());

        let poison = |p: Point3| if p.x > 0.5 && p.x < 1.5 { Point3::new(f64::NAN, 0.0, 0.0) } else { p };
        let filtered = path.transform(&poison, Calibration::unit_pixels());
        assert_eq!(filtered.size(), 2);
    }

    #[test]
    fn test_fitted_version_follows_raw() {
        let mut path = straight(3);
        assert_eq!(path.set_use_fitted(true), Err(PathError::NoFittedVersion));

        let refined = PointBuffer::from_points(
            Calibration::unit_pixels(),
            &[Point3::ORIGIN, Point3::new(2.0, 0.0, 0.0)],
        );
        path.set_fitted(refined.clone()).unwrap();
        assert_eq!(path.set_fitted(refined), Err(PathError::FittedAlreadySet));

        path.set_swc_type(SwcType::Soma);
        path.set_order(3);
        let fitted = path.fitted().unwrap();
        assert_eq!(fitted.swc_type(), SwcType::Soma);
        assert_eq!(fitted.order(), 3);

        assert!(!path.view_in_use().is_fitted());
        path.set_use_fitted(true).unwrap();
        let view = path.view_in_use();
        assert!(view.is_fitted());
        assert_eq!(view.points().len(), 2);

        assert!(path.clear_fitted().is_some());
        assert!(!path.use_fitted());
    }

    #[test]
    fn test_primary_forces_root_order() {
        let mut path = straight(2);
        path.set_order(4);
        assert!(!path.is_primary());
        path.set_primary(true);
        assert_eq!(path.order(), 1);
        assert!(path.is_primary());
    }

    #[test]
    fn test_editable_node_is_validated() {
        let mut path = straight(2);
        assert!(path.set_editable_node(Some(2)).is_err());
        path.set_editable_node(Some(1)).unwrap();
        assert!(path.is_being_edited());
        path.remove_node(0).unwrap();
        assert_eq!(path.editable_node(), None);
        path.set_editable_node(Some(0)).unwrap();
        path.stop_being_edited();
        assert!(!path.is_being_edited());
    }

    #[test]
    fn test_render_dirty_is_consumed() {
        let mut path = straight(2);
        assert!(path.take_render_dirty());
        assert!(!path.take_render_dirty());
        path.move_node(1, Point3::new(0.0, 1.0, 0.0)).unwrap();
        assert!(path.is_render_dirty());
    }
}
