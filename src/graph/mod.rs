//! The set of paths of one reconstruction and the joins between them.
//!
//! [`PathSet`] owns every [`Path`] and hands out [`PathId`] handles. All
//! operations that touch more than one path (joining, unjoining,
//! concatenation, deletion) live here so that both sides of a join are always
//! updated together. Every operation validates its arguments before it
//! mutates anything.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

pub mod id;
pub mod join;
pub mod topo;

use crate::error::{PathError, PathResult};
use crate::geom::{DownsampleDiagnostics, DownsampleOptions, Point3};
use crate::path::swc::SwcType;
use crate::path::{Path, ROOT_ORDER};

use id::{PathId, id_list_string};
use join::{Join, JoinEnd, JoinError};

/// Arena of paths with an index for id lookups.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: Vec<Path>,
    path_index: HashMap<PathId, usize>,
    next_id: usize,
}

impl PathSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to the set. A path without identifier receives the next
    /// free one; a path that carries one keeps it.
    pub fn insert(&mut self, mut path: Path) -> PathResult<PathId> {
        let id = match path.id() {
            Some(id) => {
                if self.path_index.contains_key(&id) {
                    return Err(PathError::IdAlreadyAssigned(id));
                }
                self.next_id = self.next_id.max(id.0 + 1);
                id
            }
            None => {
                let assigned = PathId::new(self.next_id);
                self.next_id += 1;
                path.set_id(assigned)?;
                assigned
            }
        };
        // Joins refer to handles of another set; the path enters unjoined.
        path.start_join = None;
        path.end_join = None;
        path.somehow_joins.clear();
        path.children.clear();
        path.set_order(ROOT_ORDER);

        self.path_index.insert(id, self.paths.len());
        self.paths.push(path);
        Ok(id)
    }

    /// Disconnect `id` from every other path and drop it from the set.
    pub fn remove(&mut self, id: PathId) -> PathResult<Path> {
        self.disconnect_from_all(id)?;
        let idx = self.index_of(id)?;
        let removed = self.paths.remove(idx);
        self.path_index.remove(&id);
        for (i, path) in self.paths.iter().enumerate().skip(idx) {
            if let Some(path_id) = path.id() {
                self.path_index.insert(path_id, i);
            }
        }
        for path in &mut self.paths {
            path.children.retain(|child| *child != id);
        }
        log::debug!("removed {id} from the set");
        Ok(removed)
    }

    #[must_use]
    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.path_index
            .get(&id)
            .and_then(|idx| self.paths.get(*idx))
    }

    /// Mutable access for single-path edits (nodes, radii, type, name).
    pub fn path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        self.path_index
            .get(&id)
            .copied()
            .and_then(move |idx| self.paths.get_mut(idx))
    }

    #[must_use]
    pub fn contains(&self, id: PathId) -> bool {
        self.path_index.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }

    /// Every id, in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<PathId> {
        let mut ids: Vec<PathId> = self.path_index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // ── Join protocol ───────────────────────────────────────────────────────

    /// Join the start of `id` onto `other` at `point`.
    pub fn set_start_join(&mut self, id: PathId, other: PathId, point: Point3) -> PathResult<()> {
        self.set_join(id, JoinEnd::Start, other, point)
    }

    /// Join the end of `id` onto `other` at `point`.
    pub fn set_end_join(&mut self, id: PathId, other: PathId, point: Point3) -> PathResult<()> {
        self.set_join(id, JoinEnd::End, other, point)
    }

    /// Join `end` of `id` onto `other` at `point`.
    ///
    /// The slot must be free, `other` must exist and differ from `id`, and the
    /// join must not close a loop. On success both paths list each other as
    /// adjacent, `id` loses its primary mark and takes the order of `other`
    /// plus one.
    pub fn set_join(
        &mut self,
        id: PathId,
        end: JoinEnd,
        other: PathId,
        point: Point3,
    ) -> PathResult<()> {
        let path = self.get(id)?;
        if !self.contains(other) {
            return Err(JoinError::UnknownTarget(other).into());
        }
        if id == other {
            return Err(JoinError::SelfJoin(id).into());
        }
        if path.join(end).is_some() {
            return Err(JoinError::EndAlreadyJoined { path: id, end }.into());
        }
        if self.reaches(other, id, None) {
            return Err(JoinError::WouldCreateCycle { path: id, other }.into());
        }

        let (this, that) = self.pair_mut(id, other)?;
        *this.join_slot(end) = Some(Join::new(other, point));
        this.somehow_joins.insert(other);
        that.somehow_joins.insert(id);
        // A path hanging off another one is no longer a root.
        this.set_primary(false);
        this.set_order(that.order() + 1);
        log::debug!(
            "joined {end} of {id} onto {other}; order is now {}",
            this.order()
        );
        Ok(())
    }

    pub fn unset_start_join(&mut self, id: PathId) -> PathResult<Join> {
        self.unset_join(id, JoinEnd::Start)
    }

    pub fn unset_end_join(&mut self, id: PathId) -> PathResult<Join> {
        self.unset_join(id, JoinEnd::End)
    }

    /// Remove the join at `end` of `id` and return it.
    ///
    /// The two paths stay adjacent while another join still links them in
    /// either direction. The order of `id` resets to 1.
    pub fn unset_join(&mut self, id: PathId, end: JoinEnd) -> PathResult<Join> {
        let join = *self
            .get(id)?
            .join(end)
            .ok_or(JoinError::EndNotJoined { path: id, end })?;
        let other = join.target;

        let path = self.get_mut(id)?;
        *path.join_slot(end) = None;
        path.set_order(ROOT_ORDER);
        let linked_here = path.joins_onto(other);
        let still_linked = linked_here || self.path(other).is_some_and(|that| that.joins_onto(id));
        if !still_linked {
            self.unlink(id, other);
        }
        log::debug!("unjoined {end} of {id} from {other}");
        Ok(join)
    }

    /// Sever every join and adjacency between `id` and any other path.
    ///
    /// Paths whose start or end was joined onto `id` lose that join.
    pub fn disconnect_from_all(&mut self, id: PathId) -> PathResult<()> {
        let neighbours: Vec<PathId> = self.get(id)?.somehow_joins.iter().copied().collect();
        for neighbour in &neighbours {
            if let Some(other) = self.path_mut(*neighbour) {
                for end in [JoinEnd::Start, JoinEnd::End] {
                    let slot = other.join_slot(end);
                    if slot.is_some_and(|join| join.target == id) {
                        *slot = None;
                    }
                }
                other.somehow_joins.remove(&id);
            }
        }
        let path = self.get_mut(id)?;
        path.start_join = None;
        path.end_join = None;
        path.somehow_joins.clear();
        path.set_order(ROOT_ORDER);
        log::debug!("disconnected {id} from {} paths", neighbours.len());
        Ok(())
    }

    // ── Join queries ────────────────────────────────────────────────────────

    pub fn start_joins(&self, id: PathId) -> PathResult<Option<PathId>> {
        Ok(self.get(id)?.start_join().map(|join| join.target))
    }

    pub fn end_joins(&self, id: PathId) -> PathResult<Option<PathId>> {
        Ok(self.get(id)?.end_join().map(|join| join.target))
    }

    pub fn somehow_joins(&self, id: PathId) -> PathResult<&BTreeSet<PathId>> {
        Ok(self.get(id)?.somehow_joins())
    }

    pub fn children(&self, id: PathId) -> PathResult<&[PathId]> {
        Ok(self.get(id)?.children())
    }

    /// Comma separated ids of the paths adjacent to `id`.
    pub fn somehow_joins_string(&self, id: PathId) -> PathResult<String> {
        Ok(id_list_string(self.get(id)?.somehow_joins.iter().copied()))
    }

    /// Comma separated ids of the children of `id`.
    pub fn children_string(&self, id: PathId) -> PathResult<String> {
        Ok(id_list_string(self.get(id)?.children.iter().copied()))
    }

    /// Every point anchoring a join that involves `id`: its own start and end
    /// join points plus the join points of paths that start or end on it.
    pub fn find_joined_points(&self, id: PathId) -> PathResult<Vec<Point3>> {
        let path = self.get(id)?;
        let mut points: Vec<Point3> = [path.start_join(), path.end_join()]
            .into_iter()
            .flatten()
            .map(|join| join.point)
            .collect();
        for neighbour in &path.somehow_joins {
            if let Some(other) = self.path(*neighbour) {
                points.extend(
                    [other.start_join(), other.end_join()]
                        .into_iter()
                        .flatten()
                        .filter(|join| join.target == id)
                        .map(|join| join.point),
                );
            }
        }
        Ok(points)
    }

    /// Indices of the nodes of `id` nearest to each of its joined points.
    pub fn find_joined_point_indices(&self, id: PathId) -> PathResult<BTreeSet<usize>> {
        let path = self.get(id)?;
        Ok(self
            .find_joined_points(id)?
            .into_iter()
            .filter_map(|point| path.points().nearest_index_unbounded(point))
            .collect())
    }

    // ── Bulk operations ─────────────────────────────────────────────────────

    /// Append the nodes of `other` to `id`.
    ///
    /// Leading nodes of `other` equal to the last node of `id` are skipped.
    /// Fails when `id` already has an end join. An end join of `other` moves
    /// over to `id`, after which `other` is disconnected from everything; it
    /// stays in the set for the caller to remove.
    pub fn concatenate(&mut self, id: PathId, other: PathId) -> PathResult<()> {
        let path = self.get(id)?;
        let appended = self.get(other)?;
        if id == other {
            return Err(JoinError::SelfJoin(id).into());
        }
        if path.end_join().is_some() {
            return Err(PathError::IllegalConcatenation(id));
        }
        let transferred = appended.end_join().copied();
        if let Some(join) = transferred {
            if join.target == id {
                return Err(JoinError::SelfJoin(id).into());
            }
            if self.reaches(join.target, id, Some(other)) {
                return Err(JoinError::WouldCreateCycle {
                    path: id,
                    other: join.target,
                }
                .into());
            }
        }

        let skip = path.points().leading_duplicates_of(appended.points());
        let incoming = appended.points().clone();
        self.get_mut(id)?.points_mut().append(&incoming, skip);
        self.disconnect_from_all(other)?;
        if let Some(join) = transferred {
            self.set_join(id, JoinEnd::End, join.target, join.point)?;
        }
        log::debug!(
            "appended {} nodes of {other} to {id} (skipped {skip} duplicates)",
            incoming.len() - skip
        );
        Ok(())
    }

    /// Simplify `id` between its fixed points (ends and join points).
    pub fn downsample(
        &mut self,
        id: PathId,
        options: DownsampleOptions,
    ) -> PathResult<DownsampleDiagnostics> {
        let fixed = self.find_joined_point_indices(id)?;
        Ok(self.get_mut(id)?.downsample_with_fixed(&fixed, options))
    }

    /// Simplify every path. Fixed points come from the joins as they are
    /// before the call.
    pub fn downsample_all(&mut self, options: DownsampleOptions) -> Vec<DownsampleDiagnostics> {
        let fixed: Vec<BTreeSet<usize>> = self
            .paths
            .iter()
            .map(|path| {
                path.id()
                    .and_then(|id| self.find_joined_point_indices(id).ok())
                    .unwrap_or_default()
            })
            .collect();
        downsample_paths(&mut self.paths, fixed, options)
    }

    // ── Export ──────────────────────────────────────────────────────────────

    /// One summary per path, ordered by id.
    #[must_use]
    pub fn summaries(&self) -> Vec<PathSummary> {
        let mut summaries: Vec<PathSummary> =
            self.paths.iter().filter_map(PathSummary::of).collect();
        summaries.sort_by_key(|summary| summary.id);
        summaries
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn index_of(&self, id: PathId) -> PathResult<usize> {
        self.path_index
            .get(&id)
            .copied()
            .ok_or(PathError::UnknownPath(id))
    }

    fn get(&self, id: PathId) -> PathResult<&Path> {
        self.path(id).ok_or(PathError::UnknownPath(id))
    }

    fn get_mut(&mut self, id: PathId) -> PathResult<&mut Path> {
        self.path_mut(id).ok_or(PathError::UnknownPath(id))
    }

    /// Mutable access to two distinct paths at once.
    fn pair_mut(&mut self, a: PathId, b: PathId) -> PathResult<(&mut Path, &mut Path)> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return Err(JoinError::SelfJoin(a).into());
        }
        if ia < ib {
            let (left, right) = self.paths.split_at_mut(ib);
            Ok((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.paths.split_at_mut(ia);
            Ok((&mut right[0], &mut left[ib]))
        }
    }

    fn unlink(&mut self, a: PathId, b: PathId) {
        if let Some(path) = self.path_mut(a) {
            path.somehow_joins.remove(&b);
        }
        if let Some(path) = self.path_mut(b) {
            path.somehow_joins.remove(&a);
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        use rayon::prelude::*;

        fn downsample_paths(
            paths: &mut [Path],
            fixed: Vec<BTreeSet<usize>>,
            options: DownsampleOptions,
        ) -> Vec<DownsampleDiagnostics> {
            paths
                .par_iter_mut()
                .zip(fixed.into_par_iter())
                .map(|(path, fixed)| path.downsample_with_fixed(&fixed, options))
                .collect()
        }
    } else {
        fn downsample_paths(
            paths: &mut [Path],
            fixed: Vec<BTreeSet<usize>>,
            options: DownsampleOptions,
        ) -> Vec<DownsampleDiagnostics> {
            paths
                .iter_mut()
                .zip(fixed)
                .map(|(path, fixed)| path.downsample_with_fixed(&fixed, options))
                .collect()
        }
    }
}

/// Serializable overview of one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSummary {
    pub id: PathId,
    pub name: String,
    pub swc_type: SwcType,
    pub order: usize,
    pub size: usize,
    pub length: f64,
    pub mean_radius: f64,
    pub has_radii: bool,
    pub starts_on: Option<PathId>,
    pub ends_on: Option<PathId>,
    pub somehow_joins: Vec<PathId>,
    pub children: Vec<PathId>,
}

impl PathSummary {
    fn of(path: &Path) -> Option<Self> {
        Some(Self {
            id: path.id()?,
            name: path.name(),
            swc_type: path.swc_type(),
            order: path.order(),
            size: path.size(),
            length: path.length(),
            mean_radius: path.mean_radius(),
            has_radii: path.has_radii(),
            starts_on: path.start_join().map(|join| join.target),
            ends_on: path.end_join().map(|join| join.target),
            somehow_joins: path.somehow_joins().iter().copied().collect(),
            children: path.children().to_vec(),
        })
    }
}
