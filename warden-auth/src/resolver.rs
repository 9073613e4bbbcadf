// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cycle-safe resolution of a holder's own and inherited nodes.
use std::collections::HashSet;

use tracing::trace;
use warden_core::{Node, QueryOptions, Timestamp};

use crate::group::GroupLookup;
use crate::holder::{HolderId, PermissionHolder};

/// Node together with the holder which contributed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalizedNode {
    node: Node,
    location: HolderId,
}

impl LocalizedNode {
    pub fn new(node: Node, location: HolderId) -> Self {
        Self { node, location }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Holder this node was found on, the resolved holder itself or one of its ancestors.
    pub fn location(&self) -> &HolderId {
        &self.location
    }
}

/// Depth-first walk over a holder and the groups it inherits from.
///
/// The walk is pre-order: the nodes of a holder (in local priority order) are followed by the
/// nodes of its first parent group and that group's ancestors, then by the second parent and so
/// on. Parents of one holder are visited by descending group weight, parents with equal weight
/// keep their local priority order.
///
/// Every group is visited at most once per resolution. A group reached a second time, through a
/// diamond or a cycle in the inheritance graph, is skipped without error. Groups which are not
/// known to the lookup are skipped as well.
pub struct InheritanceResolver<'a, G> {
    groups: &'a G,
    now: Timestamp,
}

impl<'a, G> InheritanceResolver<'a, G>
where
    G: GroupLookup,
{
    pub fn new(groups: &'a G) -> Self {
        Self {
            groups,
            now: Timestamp::now(),
        }
    }

    /// Evaluates expiry against the given time instead of the system clock.
    pub fn at(mut self, now: Timestamp) -> Self {
        self.now = now;
        self
    }

    /// Returns all nodes of the holder and its ancestors without any context filtering.
    pub fn resolve_all(&self, holder: &PermissionHolder) -> Vec<LocalizedNode> {
        self.resolve(holder, &QueryOptions::allow_all())
    }

    /// Returns the nodes of the holder and its ancestors which apply under the query.
    pub fn resolve(&self, holder: &PermissionHolder, query: &QueryOptions) -> Vec<LocalizedNode> {
        let mut visited = HashSet::new();
        if let HolderId::Group(name) = holder.id() {
            visited.insert(name.clone());
        }

        let mut result = Vec::new();
        self.walk(holder, query, &mut visited, &mut result);
        result
    }

    fn walk(
        &self,
        holder: &PermissionHolder,
        query: &QueryOptions,
        visited: &mut HashSet<String>,
        result: &mut Vec<LocalizedNode>,
    ) {
        let nodes = holder.applicable_nodes(query, self.now);

        let mut parents = Vec::new();
        if query.resolve_inheritance() {
            for node in nodes.iter().filter(|node| node.value()) {
                let Some(name) = node.group_name() else {
                    continue;
                };
                if !visited.insert(name.to_string()) {
                    trace!(holder = %holder.id(), group = name, "group already visited");
                    continue;
                }
                match self.groups.group(name) {
                    Some(group) => parents.push(group),
                    None => trace!(holder = %holder.id(), group = name, "unknown group skipped"),
                }
            }
        }

        result.extend(
            nodes
                .into_iter()
                .map(|node| LocalizedNode::new(node, holder.id().clone())),
        );

        // Stable sort, equally weighted parents keep their local order.
        parents.sort_by_key(|group| std::cmp::Reverse(group.weight().unwrap_or_default()));
        for parent in parents {
            self.walk(parent.holder(), query, visited, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use warden_core::{ContextSet, Node, QueryOptions, Timestamp};

    use crate::group::Group;
    use crate::holder::{HolderId, PermissionHolder};

    use super::InheritanceResolver;

    fn groups(names: &[&str]) -> HashMap<String, Arc<Group>> {
        names
            .iter()
            .map(|name| (name.to_string(), Arc::new(Group::new(name))))
            .collect()
    }

    fn inherit(holder: &PermissionHolder, parent: &str) {
        holder.set_permission(Node::inheritance(parent).build());
    }

    fn locations(resolved: &[super::LocalizedNode]) -> Vec<String> {
        resolved
            .iter()
            .map(|node| node.location().to_string())
            .collect()
    }

    #[test]
    fn pre_order_walk() {
        // user -> a -> c
        //      -> b
        let groups = groups(&["a", "b", "c"]);
        let user = PermissionHolder::new(HolderId::group("user"));
        inherit(&user, "a");
        inherit(&user, "b");
        inherit(&groups["a"], "c");
        groups["c"].set_permission(Node::builder("c.perm").build());
        groups["b"].set_permission(Node::builder("b.perm").build());

        let resolved = InheritanceResolver::new(&groups).resolve(&user, &QueryOptions::global());
        assert_eq!(
            locations(&resolved),
            vec![
                "group:user",
                "group:user",
                "group:a",
                "group:c",
                "group:b",
            ]
        );
    }

    #[test]
    fn cycles_terminate() {
        // a -> b -> a
        let groups = groups(&["a", "b"]);
        inherit(&groups["a"], "b");
        inherit(&groups["b"], "a");
        groups["a"].set_permission(Node::builder("a.perm").build());
        groups["b"].set_permission(Node::builder("b.perm").build());

        let user = PermissionHolder::new(HolderId::group("user"));
        inherit(&user, "a");

        let resolved = InheritanceResolver::new(&groups).resolve(&user, &QueryOptions::global());
        let perms: Vec<&str> = resolved
            .iter()
            .map(|node| node.node().key())
            .filter(|key| key.ends_with(".perm"))
            .collect();
        assert_eq!(perms, vec!["a.perm", "b.perm"]);

        // Resolving a group inside the cycle does not visit itself again.
        let resolved = InheritanceResolver::new(&groups).resolve(&groups["a"], &QueryOptions::global());
        assert_eq!(
            resolved
                .iter()
                .filter(|node| node.node().key() == "a.perm")
                .count(),
            1
        );
    }

    #[test]
    fn diamond_contributes_once() {
        // user -> a -> shared
        //      -> b -> shared
        let groups = groups(&["a", "b", "shared"]);
        let user = PermissionHolder::new(HolderId::group("user"));
        inherit(&user, "a");
        inherit(&user, "b");
        inherit(&groups["a"], "shared");
        inherit(&groups["b"], "shared");
        groups["shared"].set_permission(Node::builder("shared.perm").build());

        let resolved = InheritanceResolver::new(&groups).resolve(&user, &QueryOptions::global());
        assert_eq!(
            resolved
                .iter()
                .filter(|node| node.node().key() == "shared.perm")
                .count(),
            1
        );
    }

    #[test]
    fn unknown_groups_are_skipped() {
        let groups = groups(&[]);
        let user = PermissionHolder::new(HolderId::group("user"));
        inherit(&user, "missing");
        user.set_permission(Node::builder("own").build());

        let resolved = InheritanceResolver::new(&groups).resolve(&user, &QueryOptions::global());
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn context_filtering() {
        let groups = groups(&["builder"]);
        let user = PermissionHolder::new(HolderId::group("user"));
        user.set_permission(Node::inheritance("builder").server("creative").build());
        user.set_permission(Node::builder("lobby.only").server("lobby").build());
        groups["builder"].set_permission(Node::builder("build").build());

        let lobby = QueryOptions::contextual(ContextSet::singleton("server", "lobby"));
        let resolved = InheritanceResolver::new(&groups).resolve(&user, &lobby);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].node().key(), "lobby.only");

        let creative = QueryOptions::contextual(ContextSet::singleton("server", "creative"));
        let resolved = InheritanceResolver::new(&groups).resolve(&user, &creative);
        assert!(resolved.iter().any(|node| node.node().key() == "build"));

        // Without filtering every node of every reachable group is returned.
        let resolved = InheritanceResolver::new(&groups).resolve_all(&user);
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn multi_valued_contexts() {
        let groups = groups(&["builder"]);
        let user = PermissionHolder::new(HolderId::group("user"));
        user.set_permission(
            Node::inheritance("builder")
                .with_context("server", "hub")
                .with_context("server", "lobby")
                .build(),
        );
        groups["builder"].set_permission(Node::builder("build").build());

        let hub = QueryOptions::contextual(ContextSet::singleton("server", "hub"));
        assert!(InheritanceResolver::new(&groups).resolve(&user, &hub).is_empty());

        let both = QueryOptions::contextual(
            ContextSet::builder()
                .with("server", "hub")
                .with("server", "lobby")
                .build(),
        );
        let resolved = InheritanceResolver::new(&groups).resolve(&user, &both);
        assert_eq!(locations(&resolved), vec!["group:user", "group:builder"]);
    }

    #[test]
    fn inheritance_can_be_disabled() {
        let groups = groups(&["a"]);
        let user = PermissionHolder::new(HolderId::group("user"));
        inherit(&user, "a");
        groups["a"].set_permission(Node::builder("a.perm").build());

        let query = QueryOptions::builder().resolve_inheritance(false).build();
        let resolved = InheritanceResolver::new(&groups).resolve(&user, &query);
        assert_eq!(locations(&resolved), vec!["group:user"]);
    }

    #[test]
    fn expired_nodes_are_excluded() {
        let groups = groups(&["a"]);
        let user = PermissionHolder::new(HolderId::group("user"));
        user.set_permission(
            Node::inheritance("a")
                .expiry(Timestamp::new(100))
                .build(),
        );
        groups["a"].set_permission(Node::builder("a.perm").build());

        let before = InheritanceResolver::new(&groups)
            .at(Timestamp::new(50))
            .resolve(&user, &QueryOptions::global());
        assert_eq!(before.len(), 2);

        let after = InheritanceResolver::new(&groups)
            .at(Timestamp::new(150))
            .resolve(&user, &QueryOptions::global());
        assert!(after.is_empty());
    }

    #[test]
    fn parents_ordered_by_weight() {
        let groups = groups(&["light", "heavy"]);
        groups["heavy"].set_permission(Node::weight(100).build());
        groups["light"].set_permission(Node::weight(1).build());

        let user = PermissionHolder::new(HolderId::group("user"));
        inherit(&user, "heavy");
        inherit(&user, "light");

        let resolved = InheritanceResolver::new(&groups).resolve(&user, &QueryOptions::global());
        let parents: Vec<String> = locations(&resolved)
            .into_iter()
            .filter(|location| location != "group:user")
            .collect();
        assert_eq!(parents, vec!["group:heavy", "group:light"]);
    }
}
