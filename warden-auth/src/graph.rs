// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dependency graph of loaded groups.
use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Dfs, Reversed};
use tracing::debug;

/// Directed graph of group inheritance, an edge points from a group to a group it inherits from.
///
/// Edges are taken from inheritance nodes in any context, so the graph over-approximates the
/// inheritance of any single query. It is used to find every group which might depend on a
/// changed group.
#[derive(Debug, Default)]
pub struct GroupGraph {
    graph: DiGraphMap<u32, ()>,
    ids: HashMap<String, u32>,
    names: HashMap<u32, String>,
    next_id: u32,
}

impl GroupGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn id(&mut self, name: &str) -> u32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(name.to_string(), id);
        self.names.insert(id, name.to_string());
        self.graph.add_node(id);
        id
    }

    /// Forgets a group once no edge points to or from it.
    fn prune(&mut self, id: u32) {
        let isolated = self.graph.neighbors_directed(id, Direction::Incoming).next().is_none()
            && self.graph.neighbors(id).next().is_none();
        if isolated {
            self.graph.remove_node(id);
            if let Some(name) = self.names.remove(&id) {
                self.ids.remove(&name);
            }
        }
    }

    fn name(&self, id: u32) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or_default()
    }

    /// Replaces the parents of a group, returns true if the edges changed.
    pub fn set_parents(&mut self, group: &str, parents: &BTreeSet<String>) -> bool {
        let id = self.id(group);
        let current: BTreeSet<u32> = self.graph.neighbors(id).collect();
        let desired: BTreeSet<u32> = parents.iter().map(|parent| self.id(parent)).collect();
        if current == desired {
            self.prune(id);
            return false;
        }

        for parent in current.difference(&desired) {
            self.graph.remove_edge(id, *parent);
            self.prune(*parent);
        }
        for parent in desired.difference(&current) {
            self.graph.add_edge(id, *parent, ());
        }
        self.prune(id);

        if is_cyclic_directed(&self.graph) {
            debug!(group, "inheritance graph contains a cycle");
        }
        true
    }

    /// Removes the outgoing edges of an unloaded group.
    ///
    /// Groups inheriting from it keep their edges, the group may be loaded again. Groups left
    /// without any edge are dropped from the graph.
    pub fn remove(&mut self, group: &str) -> bool {
        self.set_parents(group, &BTreeSet::new())
    }

    /// Names of all groups directly or transitively inheriting from the group.
    pub fn dependents(&self, group: &str) -> BTreeSet<String> {
        let Some(start) = self.ids.get(group) else {
            return BTreeSet::new();
        };

        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, *start);
        let mut dependents = BTreeSet::new();
        while let Some(id) = dfs.next(reversed) {
            if id != *start {
                dependents.insert(self.name(id).to_string());
            }
        }
        dependents
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Groups of each inheritance cycle, every cycle sorted by name.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut names: Vec<String> = component
                    .into_iter()
                    .map(|id| self.name(id).to_string())
                    .collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }
}
