//! Tree-level utilities over the joins of a [`PathSet`].
//!
//! Joins are directional: a path whose start or end is joined onto another
//! path hangs off that path. Following join targets therefore walks towards
//! the root, and a valid set never contains a loop along those edges.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;

use crate::path::ROOT_ORDER;

use super::PathSet;
use super::id::PathId;

/// Inconsistencies reported by [`PathSet::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("{path} joins onto {target}, which is not part of the set")]
    DanglingJoin { path: PathId, target: PathId },

    #[error("{path} lists {other} as adjacent but not the other way round")]
    AsymmetricAdjacency { path: PathId, other: PathId },

    #[error("{path} joins onto {target} but does not list it as adjacent")]
    MissingAdjacency { path: PathId, target: PathId },

    #[error("{0} has no nodes")]
    EmptyPath(PathId),

    #[error("joins form a cycle: {}", format_cycle(.cycle))]
    Cycle { cycle: Vec<PathId> },
}

fn format_cycle(cycle: &[PathId]) -> String {
    cycle
        .iter()
        .map(|PathId(id)| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl PathSet {
    /// True when `to` is reachable from `from` by following join targets.
    /// Edges of `skip` are ignored.
    pub(crate) fn reaches(&self, from: PathId, to: PathId, skip: Option<PathId>) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if Some(current) == skip || !visited.insert(current) {
                continue;
            }
            if let Some(path) = self.path(current) {
                stack.extend(
                    [path.start_join(), path.end_join()]
                        .into_iter()
                        .flatten()
                        .map(|join| join.target),
                );
            }
        }
        false
    }

    /// Assign children below `root`, claiming adjacent paths from `remaining`.
    ///
    /// Each path claims all of its still unclaimed neighbours before any of
    /// them claims its own, and the first child's subtree is completed before
    /// the second child's. Claimed paths are removed from `remaining`.
    pub fn set_children(&mut self, root: PathId, remaining: &mut BTreeSet<PathId>) {
        remaining.remove(&root);
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let Some(path) = self.path_mut(current) else {
                continue;
            };
            let claimed: Vec<PathId> = path
                .somehow_joins
                .iter()
                .copied()
                .filter(|neighbour| remaining.remove(neighbour))
                .collect();
            path.children.clone_from(&claimed);
            stack.extend(claimed.into_iter().rev());
        }
    }

    /// Rebuild every children list from the roots.
    ///
    /// Roots are the primary paths in id order; paths left unclaimed after
    /// that start their own tree.
    pub fn rebuild_children(&mut self) {
        for path in &mut self.paths {
            path.children.clear();
        }
        let ids = self.ids();
        let mut remaining: BTreeSet<PathId> = ids.iter().copied().collect();
        let roots: Vec<PathId> = ids
            .iter()
            .copied()
            .filter(|id| self.path(*id).is_some_and(|path| path.is_primary()))
            .collect();
        for root in roots.into_iter().chain(ids) {
            if remaining.contains(&root) {
                self.set_children(root, &mut remaining);
            }
        }
    }

    /// Derive every order from the joins.
    ///
    /// Primary paths and paths without joins are roots. Any other path sits
    /// one order below its upstream path: the target of its start join, or of
    /// its end join when the start is free.
    pub fn recompute_orders(&mut self) {
        let upstream: HashMap<PathId, Option<PathId>> = self
            .paths
            .iter()
            .filter_map(|path| {
                let id = path.id()?;
                let parent = if path.is_marked_primary() {
                    None
                } else {
                    path.start_join()
                        .or(path.end_join())
                        .map(|join| join.target)
                        .filter(|target| self.contains(*target))
                };
                Some((id, parent))
            })
            .collect();

        let mut orders: BTreeMap<PathId, usize> = BTreeMap::new();
        for &id in upstream.keys() {
            let mut chain = Vec::new();
            let mut current = Some(id);
            let mut base = ROOT_ORDER - 1;
            while let Some(node) = current {
                if let Some(&known) = orders.get(&node) {
                    base = known;
                    break;
                }
                if chain.contains(&node) {
                    break;
                }
                chain.push(node);
                current = upstream.get(&node).copied().flatten();
            }
            for (depth, node) in chain.into_iter().rev().enumerate() {
                orders.insert(node, base + depth + 1);
            }
        }

        for path in &mut self.paths {
            if let Some(order) = path.id().and_then(|id| orders.get(&id)) {
                path.set_order(*order);
            }
        }
        log::debug!("recomputed orders of {} paths", orders.len());
    }

    /// Recompute every adjacency set from the directional joins alone.
    pub fn rebuild_adjacency(&mut self) {
        let mut adjacency: HashMap<PathId, BTreeSet<PathId>> = HashMap::new();
        for path in &self.paths {
            let Some(id) = path.id() else { continue };
            adjacency.entry(id).or_default();
            for join in [path.start_join(), path.end_join()].into_iter().flatten() {
                if self.contains(join.target) && join.target != id {
                    adjacency.entry(id).or_default().insert(join.target);
                    adjacency.entry(join.target).or_default().insert(id);
                }
            }
        }
        for path in &mut self.paths {
            if let Some(id) = path.id() {
                path.somehow_joins = adjacency.remove(&id).unwrap_or_default();
            }
        }
    }

    /// Check that joins point into the set, adjacency is symmetric and
    /// covers every join, no path is empty and joins do not loop.
    pub fn validate(&self) -> Result<(), TopologyError> {
        for path in &self.paths {
            let Some(id) = path.id() else { continue };
            if path.size() == 0 {
                return Err(TopologyError::EmptyPath(id));
            }
            for join in [path.start_join(), path.end_join()].into_iter().flatten() {
                if !self.contains(join.target) {
                    return Err(TopologyError::DanglingJoin {
                        path: id,
                        target: join.target,
                    });
                }
                if !path.somehow_joins.contains(&join.target) {
                    return Err(TopologyError::MissingAdjacency {
                        path: id,
                        target: join.target,
                    });
                }
            }
            for other in &path.somehow_joins {
                let symmetric = self
                    .path(*other)
                    .is_some_and(|that| that.somehow_joins.contains(&id));
                if !symmetric {
                    return Err(TopologyError::AsymmetricAdjacency {
                        path: id,
                        other: *other,
                    });
                }
            }
        }

        match find_cycle(&self.join_edges()) {
            Some(cycle) => Err(TopologyError::Cycle { cycle }),
            None => Ok(()),
        }
    }

    fn join_edges(&self) -> BTreeMap<PathId, Vec<PathId>> {
        self.paths
            .iter()
            .filter_map(|path| {
                let id = path.id()?;
                let targets = [path.start_join(), path.end_join()]
                    .into_iter()
                    .flatten()
                    .map(|join| join.target)
                    .collect();
                Some((id, targets))
            })
            .collect()
    }
}

fn find_cycle(adjacency: &BTreeMap<PathId, Vec<PathId>>) -> Option<Vec<PathId>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum VisitState {
        Unvisited,
        Visiting,
        Visited,
    }

    fn dfs(
        node: PathId,
        adjacency: &BTreeMap<PathId, Vec<PathId>>,
        state: &mut HashMap<PathId, VisitState>,
        stack: &mut Vec<PathId>,
    ) -> Option<Vec<PathId>> {
        state.insert(node, VisitState::Visiting);
        stack.push(node);

        for neighbour in adjacency.get(&node).into_iter().flatten() {
            match state
                .get(neighbour)
                .copied()
                .unwrap_or(VisitState::Unvisited)
            {
                VisitState::Unvisited => {
                    if let Some(cycle) = dfs(*neighbour, adjacency, state, stack) {
                        return Some(cycle);
                    }
                }
                VisitState::Visiting => {
                    if let Some(position) = stack.iter().position(|n| n == neighbour) {
                        let mut cycle = stack[position..].to_vec();
                        cycle.push(*neighbour);
                        return Some(cycle);
                    }
                }
                VisitState::Visited => {}
            }
        }

        stack.pop();
        state.insert(node, VisitState::Visited);
        None
    }

    let mut state: HashMap<PathId, VisitState> = HashMap::new();
    for node in adjacency.keys() {
        if state.get(node).copied().unwrap_or(VisitState::Unvisited) == VisitState::Unvisited {
            let mut stack = Vec::new();
            if let Some(cycle) = dfs(*node, adjacency, &mut state, &mut stack) {
                return Some(cycle);
            }
        }
    }

    None
}
