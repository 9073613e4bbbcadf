// SPDX-License-Identifier: MIT OR Apache-2.0

//! Node storage shared by users and groups.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;
use warden_core::{
    ContextSet, Equality, LegacyKeyError, MutateResult, Node, QueryOptions, Timestamp, UserId,
};

use crate::ordering::sort_by_priority;
use crate::registry::Invalidator;

/// Identifier of a permission holder.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HolderId {
    User(UserId),
    Group(String),
}

impl HolderId {
    pub fn group(name: &str) -> Self {
        HolderId::Group(name.trim().to_lowercase())
    }

    pub fn is_user(&self) -> bool {
        matches!(self, HolderId::User(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, HolderId::Group(_))
    }
}

impl Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HolderId::User(id) => write!(f, "user:{id}"),
            HolderId::Group(name) => write!(f, "group:{name}"),
        }
    }
}

/// How to merge a temporary node into an existing temporary node with the same key, value and
/// context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TemporaryMergeBehaviour {
    /// Add the remaining duration of the new node to the existing one.
    Accumulate,

    /// Keep whichever node expires later.
    Replace,

    /// Keep the existing node and report `AlreadyHas`.
    Deny,
}

/// Nodes grouped by the context they apply in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMap(BTreeMap<ContextSet, BTreeSet<Node>>);

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, returns false if the exact node was already present.
    pub fn insert(&mut self, node: Node) -> bool {
        self.0
            .entry(node.context().clone())
            .or_default()
            .insert(node)
    }

    /// Removes the exact node, returns false if it was not present.
    pub fn remove(&mut self, node: &Node) -> bool {
        let Some(nodes) = self.0.get_mut(node.context()) else {
            return false;
        };
        let removed = nodes.remove(node);
        if nodes.is_empty() {
            self.0.remove(node.context());
        }
        removed
    }

    /// Returns the first node equal to `node` under the given predicate.
    pub fn find(&self, node: &Node, equality: Equality) -> Option<&Node> {
        self.0
            .get(node.context())?
            .iter()
            .find(|other| other.equals(node, equality))
    }

    pub fn contains(&self, node: &Node, equality: Equality) -> bool {
        self.find(node, equality).is_some()
    }

    /// Nodes stored for exactly this context.
    pub fn in_context(&self, context: &ContextSet) -> impl Iterator<Item = &Node> {
        self.0.get(context).into_iter().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.0.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes all nodes matching the predicate, returns how many were removed.
    pub fn remove_matching<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Node) -> bool,
    {
        let mut removed = 0;
        self.0.retain(|_, nodes| {
            let before = nodes.len();
            nodes.retain(|node| !predicate(node));
            removed += before - nodes.len();
            !nodes.is_empty()
        });
        removed
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<Node> for NodeMap {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        let mut map = NodeMap::new();
        for node in iter {
            map.insert(node);
        }
        map
    }
}

#[derive(Debug, Default)]
struct HolderState {
    enduring: NodeMap,
    transient: NodeMap,
}

/// Owner of an enduring (persisted) and a transient (session-only) node collection.
///
/// Reads take a shared lock and copy the nodes they need, mutations take the exclusive lock of
/// this holder only. Every successful mutation drops cached results of this holder, and for
/// groups of all holders inheriting from it, when the holder is managed by a
/// [`Registry`](crate::Registry).
///
/// A second, asynchronous lock guards persistence, see [`PermissionHolder::lock_io`].
#[derive(Debug)]
pub struct PermissionHolder {
    id: HolderId,
    state: RwLock<HolderState>,
    io_lock: Mutex<()>,
    invalidator: OnceLock<Invalidator>,
}

impl PermissionHolder {
    pub fn new(id: HolderId) -> Self {
        Self {
            id,
            state: RwLock::default(),
            io_lock: Mutex::new(()),
            invalidator: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &HolderId {
        &self.id
    }

    /// Acquires the persistence lock of this holder.
    ///
    /// Loads and saves hold the returned guard across reading the stored state, computing the
    /// difference and writing it, so at most one persistence operation per holder is in flight.
    pub async fn lock_io(&self) -> MutexGuard<'_, ()> {
        self.io_lock.lock().await
    }

    pub(crate) fn attach(&self, invalidator: Invalidator) {
        let _ = self.invalidator.set(invalidator);
    }

    fn read_state(&self) -> RwLockReadGuard<'_, HolderState> {
        self.state.read().expect("acquire shared read access on holder")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, HolderState> {
        self.state.write().expect("acquire exclusive write access on holder")
    }

    /// Runs a mutation and announces it if anything changed.
    fn mutate<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut HolderState) -> (R, bool),
    {
        let (result, changed) = {
            let mut state = self.write_state();
            f(&mut state)
        };
        if changed {
            trace!(holder = %self.id, "nodes changed");
            self.invalidate();
        }
        result
    }

    /// Drops cached results depending on this holder.
    pub fn invalidate(&self) {
        if let Some(invalidator) = self.invalidator.get() {
            invalidator.holder_changed(self);
        }
    }

    pub fn enduring_nodes(&self) -> Vec<Node> {
        self.read_state().enduring.iter().cloned().collect()
    }

    pub fn transient_nodes(&self) -> Vec<Node> {
        self.read_state().transient.iter().cloned().collect()
    }

    /// Enduring and transient nodes, transient first.
    pub fn all_nodes(&self) -> Vec<Node> {
        let state = self.read_state();
        state
            .transient
            .iter()
            .chain(state.enduring.iter())
            .cloned()
            .collect()
    }

    pub fn has_node(&self, node: &Node, equality: Equality) -> bool {
        self.read_state().enduring.contains(node, equality)
    }

    pub fn has_transient_node(&self, node: &Node, equality: Equality) -> bool {
        self.read_state().transient.contains(node, equality)
    }

    /// Nodes of this holder which apply under the query and did not expire, ordered by local
    /// priority.
    pub(crate) fn applicable_nodes(&self, query: &QueryOptions, now: Timestamp) -> Vec<Node> {
        let mut nodes: Vec<Node> = {
            let state = self.read_state();
            state
                .transient
                .iter()
                .chain(state.enduring.iter())
                .filter(|node| !node.has_expired_at(now) && query.satisfies(node))
                .cloned()
                .collect()
        };
        sort_by_priority(&mut nodes);
        nodes
    }

    /// Names of all groups this holder inherits from in any context.
    pub fn parent_names(&self) -> BTreeSet<String> {
        let state = self.read_state();
        state
            .transient
            .iter()
            .chain(state.enduring.iter())
            .filter(|node| node.value())
            .filter_map(|node| node.group_name().map(str::to_string))
            .collect()
    }

    /// Names of the groups this holder directly inherits from under the query, in priority order.
    pub fn parent_groups(&self, query: &QueryOptions) -> Vec<String> {
        self.applicable_nodes(query, Timestamp::now())
            .iter()
            .filter(|node| node.value())
            .filter_map(|node| node.group_name().map(str::to_string))
            .collect()
    }

    /// Weight of this holder taken from global `weight.<n>` nodes, the highest one wins.
    pub fn weight(&self) -> Option<u32> {
        let state = self.read_state();
        state
            .transient
            .iter()
            .chain(state.enduring.iter())
            .filter(|node| node.value() && node.context().is_empty())
            .filter_map(Node::weight_value)
            .max()
    }

    /// Adds an enduring node.
    pub fn set_permission(&self, node: Node) -> MutateResult {
        self.mutate(|state| insert(&mut state.enduring, node))
    }

    /// Adds an enduring temporary node, merging it with an existing temporary node of the same
    /// key, value and context.
    pub fn set_temporary_permission(
        &self,
        node: Node,
        behaviour: TemporaryMergeBehaviour,
    ) -> MutateResult {
        let Some(expiry) = node.expiry() else {
            return self.set_permission(node);
        };

        self.mutate(|state| {
            let Some(existing) = state
                .enduring
                .find(&node, Equality::IgnoreExpiryTime)
                .cloned()
            else {
                return insert(&mut state.enduring, node);
            };

            // Both nodes are temporary as they are equal while ignoring only the expiry time.
            let existing_expiry = existing.expiry().unwrap_or(expiry);
            let merged_expiry = match behaviour {
                TemporaryMergeBehaviour::Deny => return (MutateResult::AlreadyHas, false),
                TemporaryMergeBehaviour::Replace => {
                    if expiry <= existing_expiry {
                        return (MutateResult::AlreadyHas, false);
                    }
                    expiry
                }
                TemporaryMergeBehaviour::Accumulate => {
                    existing_expiry + expiry.seconds_from(Timestamp::now())
                }
            };

            state.enduring.remove(&existing);
            state
                .enduring
                .insert(existing.to_builder().expiry(merged_expiry).build());
            (MutateResult::Success, true)
        })
    }

    /// Removes an enduring node.
    pub fn unset_permission(&self, node: &Node) -> MutateResult {
        self.mutate(|state| remove(&mut state.enduring, node))
    }

    /// Removes every enduring node with the given key and context, regardless of value and expiry.
    pub fn unset_permission_key(&self, key: &str, context: &ContextSet) -> MutateResult {
        let probe = Node::builder(key).context(context).build();
        self.mutate(|state| {
            let removed = state.enduring.remove_matching(|node| {
                node.equals(&probe, Equality::IgnoreValueOrIfTemporary)
            });
            if removed == 0 {
                (MutateResult::Lacks, false)
            } else {
                (MutateResult::Success, true)
            }
        })
    }

    /// Sets a meta node, replacing every other value of its key in the same context.
    ///
    /// Clearing and inserting happen under one lock, concurrent calls for the same key leave
    /// exactly one value behind.
    pub fn replace_meta(&self, node: Node) -> MutateResult {
        let Some((key, _)) = node.meta_entry() else {
            return self.set_permission(node);
        };
        let key = key.to_string();
        let same_key = |other: &Node| {
            other.meta_entry().is_some_and(|(other_key, _)| other_key == key)
                && other.context() == node.context()
        };

        self.mutate(|state| {
            let existing: Vec<&Node> = state.enduring.iter().filter(|other| same_key(other)).collect();
            if let [only] = existing.as_slice()
                && only.equals(&node, Equality::IgnoreExpiryTime)
            {
                return (MutateResult::AlreadyHas, false);
            }

            state.enduring.remove_matching(|other| same_key(other));
            state.enduring.insert(node.clone());
            (MutateResult::Success, true)
        })
    }

    /// Adds a transient node which is never persisted.
    pub fn set_transient_permission(&self, node: Node) -> MutateResult {
        self.mutate(|state| insert(&mut state.transient, node))
    }

    pub fn unset_transient_permission(&self, node: &Node) -> MutateResult {
        self.mutate(|state| remove(&mut state.transient, node))
    }

    /// Replaces all enduring nodes, used when loading a holder from storage.
    pub fn set_nodes(&self, nodes: impl IntoIterator<Item = Node>) {
        let nodes: NodeMap = nodes.into_iter().collect();
        self.mutate(|state| {
            let changed = state.enduring != nodes;
            state.enduring = nodes;
            ((), changed)
        })
    }

    /// Removes all enduring nodes, or only those stored for exactly the given context.
    pub fn clear_nodes(&self, context: Option<&ContextSet>) -> usize {
        self.clear_matching(|node| in_context(node, context))
    }

    /// Removes all enduring group memberships, optionally only those of one context.
    pub fn clear_parents(&self, context: Option<&ContextSet>) -> usize {
        self.clear_matching(|node| node.is_group_node() && in_context(node, context))
    }

    /// Removes all enduring meta, prefix and suffix nodes, optionally only those of one context.
    pub fn clear_meta(&self, context: Option<&ContextSet>) -> usize {
        self.clear_matching(|node| {
            (node.is_meta() || node.is_prefix() || node.is_suffix()) && in_context(node, context)
        })
    }

    /// Removes all enduring meta nodes using the given meta key.
    pub fn clear_meta_keys(&self, key: &str, context: Option<&ContextSet>) -> usize {
        let key = key.trim().to_lowercase();
        self.clear_matching(|node| {
            node.meta_entry().is_some_and(|(meta_key, _)| meta_key == key)
                && in_context(node, context)
        })
    }

    /// Removes all enduring nodes matching the predicate.
    pub fn clear_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Node) -> bool,
    {
        self.mutate(|state| {
            let removed = state.enduring.remove_matching(&predicate);
            (removed, removed > 0)
        })
    }

    pub fn clear_transient_nodes(&self) -> usize {
        self.mutate(|state| {
            let removed = state.transient.len();
            state.transient.clear();
            (removed, removed > 0)
        })
    }

    /// Removes temporary nodes which expired at `now` from both collections.
    ///
    /// Returns true if anything was removed.
    pub fn audit_temporary_nodes_at(&self, now: Timestamp) -> bool {
        self.mutate(|state| {
            let removed = state.enduring.remove_matching(|node| node.has_expired_at(now))
                + state.transient.remove_matching(|node| node.has_expired_at(now));
            if removed > 0 {
                trace!(holder = %self.id, removed, "expired nodes removed");
            }
            (removed > 0, removed > 0)
        })
    }

    pub fn audit_temporary_nodes(&self) -> bool {
        self.audit_temporary_nodes_at(Timestamp::now())
    }

    /// Enduring nodes as legacy strings with their values.
    pub fn export_nodes(&self) -> Vec<(String, bool)> {
        self.read_state()
            .enduring
            .iter()
            .map(|node| (node.to_legacy_key(), node.value()))
            .collect()
    }

    /// Adds enduring nodes from legacy strings, returns how many were new.
    ///
    /// Nothing is imported if any of the strings is malformed.
    pub fn import_nodes<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a str, bool)>,
    ) -> Result<usize, LegacyKeyError> {
        let nodes = entries
            .into_iter()
            .map(|(key, value)| Node::from_legacy_key(key, value))
            .collect::<Result<Vec<Node>, LegacyKeyError>>()?;

        Ok(self.mutate(|state| {
            let added = nodes
                .into_iter()
                .filter(|node| state.enduring.insert(node.clone()))
                .count();
            (added, added > 0)
        }))
    }
}

fn insert(map: &mut NodeMap, node: Node) -> (MutateResult, bool) {
    if map.insert(node) {
        (MutateResult::Success, true)
    } else {
        (MutateResult::AlreadyHas, false)
    }
}

fn remove(map: &mut NodeMap, node: &Node) -> (MutateResult, bool) {
    if map.remove(node) {
        (MutateResult::Success, true)
    } else {
        (MutateResult::Lacks, false)
    }
}

fn in_context(node: &Node, context: Option<&ContextSet>) -> bool {
    match context {
        Some(context) => node.context() == context,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use warden_core::{ContextSet, Equality, MutateResult, Node, QueryOptions, Timestamp};

    use super::{HolderId, PermissionHolder, TemporaryMergeBehaviour};

    fn holder() -> PermissionHolder {
        PermissionHolder::new(HolderId::group("Builders"))
    }

    #[test]
    fn group_ids_are_lowercase() {
        assert_eq!(holder().id(), &HolderId::Group("builders".into()));
    }

    #[test]
    fn set_and_unset() {
        let holder = holder();
        let node = Node::builder("build.place").build();

        assert_eq!(holder.set_permission(node.clone()), MutateResult::Success);
        assert_eq!(holder.set_permission(node.clone()), MutateResult::AlreadyHas);

        // A conflicting value is a different node, resolution order decides between both.
        let negated = node.to_builder().negated().build();
        assert_eq!(holder.set_permission(negated.clone()), MutateResult::Success);
        assert_eq!(holder.enduring_nodes().len(), 2);

        assert_eq!(holder.unset_permission(&negated), MutateResult::Success);
        assert_eq!(holder.unset_permission(&negated), MutateResult::Lacks);
        assert!(holder.has_node(&node, Equality::Exact));
    }

    #[test]
    fn unset_by_key_ignores_value_and_expiry() {
        let holder = holder();
        let lobby = ContextSet::singleton("server", "lobby");
        holder.set_permission(Node::builder("fly").context(&lobby).build());
        holder.set_permission(
            Node::builder("fly")
                .context(&lobby)
                .negated()
                .expiry(Timestamp::new(u64::MAX))
                .build(),
        );
        holder.set_permission(Node::builder("fly").build());

        assert_eq!(holder.unset_permission_key("fly", &lobby), MutateResult::Success);
        assert_eq!(holder.unset_permission_key("fly", &lobby), MutateResult::Lacks);
        assert_eq!(holder.enduring_nodes(), vec![Node::builder("fly").build()]);
    }

    #[test]
    fn replace_meta_keeps_one_value() {
        let holder = holder();
        let lobby = ContextSet::singleton("server", "lobby");
        holder.set_permission(Node::meta("prefix", "[A]").build());
        holder.set_permission(Node::meta("prefix", "[B]").build());
        holder.set_permission(Node::meta("prefix", "[L]").context(&lobby).build());

        let node = Node::meta("prefix", "[C]").build();
        assert_eq!(holder.replace_meta(node.clone()), MutateResult::Success);
        assert_eq!(holder.replace_meta(node.clone()), MutateResult::AlreadyHas);

        // Values in other contexts stay untouched.
        assert_eq!(holder.enduring_nodes().len(), 2);
        assert!(holder.has_node(&node, Equality::Exact));
        assert!(holder.has_node(
            &Node::meta("prefix", "[L]").context(&lobby).build(),
            Equality::Exact
        ));
    }

    #[test]
    fn concurrent_replace_meta() {
        let holder = holder();

        std::thread::scope(|scope| {
            for thread in 0..8 {
                let holder = &holder;
                scope.spawn(move || {
                    for round in 0..50 {
                        holder.replace_meta(Node::meta("suffix", &format!("{thread}-{round}")).build());
                    }
                });
            }
        });

        let suffixes: Vec<Node> = holder
            .enduring_nodes()
            .into_iter()
            .filter(|node| node.meta_entry().is_some_and(|(key, _)| key == "suffix"))
            .collect();
        assert_eq!(suffixes.len(), 1);
    }

    #[test]
    fn transient_nodes_are_separate() {
        let holder = holder();
        let node = Node::builder("vanish").build();

        assert_eq!(holder.set_transient_permission(node.clone()), MutateResult::Success);
        assert!(holder.enduring_nodes().is_empty());
        assert!(holder.has_transient_node(&node, Equality::Exact));
        assert_eq!(holder.all_nodes(), vec![node.clone()]);

        assert_eq!(holder.clear_transient_nodes(), 1);
        assert_eq!(holder.unset_transient_permission(&node), MutateResult::Lacks);
    }

    #[test]
    fn temporary_merge_behaviours() {
        let far = Timestamp::new(u64::MAX / 2);
        let node = |expiry: Timestamp| Node::builder("fly").expiry(expiry).build();

        let holder = holder();
        assert_eq!(
            holder.set_temporary_permission(node(far), TemporaryMergeBehaviour::Deny),
            MutateResult::Success
        );
        assert_eq!(
            holder.set_temporary_permission(node(far + 10), TemporaryMergeBehaviour::Deny),
            MutateResult::AlreadyHas
        );

        // Replace only keeps the node expiring later.
        assert_eq!(
            holder.set_temporary_permission(node(far + 10), TemporaryMergeBehaviour::Replace),
            MutateResult::Success
        );
        assert_eq!(
            holder.set_temporary_permission(node(far), TemporaryMergeBehaviour::Replace),
            MutateResult::AlreadyHas
        );
        assert_eq!(holder.enduring_nodes(), vec![node(far + 10)]);

        // Accumulate extends the existing node by the remaining duration of the new one.
        let in_an_hour = Timestamp::now() + 3600;
        assert_eq!(
            holder.set_temporary_permission(node(in_an_hour), TemporaryMergeBehaviour::Accumulate),
            MutateResult::Success
        );
        let merged = holder.enduring_nodes()[0].expiry().unwrap();
        assert!(merged >= far + 10 + 3590);
        assert_eq!(holder.enduring_nodes().len(), 1);
    }

    #[test]
    fn clear_by_context_and_kind() {
        let holder = holder();
        let lobby = ContextSet::singleton("server", "lobby");
        holder.set_permission(Node::builder("a").build());
        holder.set_permission(Node::builder("b").context(&lobby).build());
        holder.set_permission(Node::inheritance("default").build());
        holder.set_permission(Node::inheritance("vip").context(&lobby).build());
        holder.set_permission(Node::meta("color", "red").build());
        holder.set_permission(Node::meta("color", "blue").context(&lobby).build());
        holder.set_permission(Node::prefix(10, "[B]").build());

        assert_eq!(holder.clear_meta_keys("COLOR", Some(&lobby)), 1);
        assert_eq!(holder.clear_parents(Some(&lobby)), 1);
        assert_eq!(holder.clear_meta(None), 2);
        assert_eq!(holder.clear_nodes(Some(&lobby)), 1);
        assert_eq!(holder.clear_parents(None), 1);
        assert_eq!(holder.enduring_nodes(), vec![Node::builder("a").build()]);
        assert_eq!(holder.clear_nodes(None), 1);
        assert_eq!(holder.clear_nodes(None), 0);
    }

    #[test]
    fn audit_removes_only_expired_nodes() {
        let holder = holder();
        holder.set_permission(Node::builder("old").expiry(Timestamp::new(100)).build());
        holder.set_permission(Node::builder("new").expiry(Timestamp::new(300)).build());
        holder.set_transient_permission(Node::builder("gone").expiry(Timestamp::new(50)).build());
        holder.set_permission(Node::builder("forever").build());

        // Reading does not remove anything.
        let applicable = holder.applicable_nodes(&QueryOptions::global(), Timestamp::new(200));
        assert_eq!(applicable.len(), 2);
        assert_eq!(holder.all_nodes().len(), 4);

        assert!(holder.audit_temporary_nodes_at(Timestamp::new(200)));
        assert!(!holder.audit_temporary_nodes_at(Timestamp::new(200)));
        assert_eq!(holder.all_nodes().len(), 2);
    }

    #[test]
    fn weight_and_parents() {
        let holder = holder();
        holder.set_permission(Node::weight(10).build());
        holder.set_permission(Node::weight(30).build());
        holder.set_permission(Node::weight(99).server("lobby").build());
        holder.set_permission(Node::inheritance("default").build());
        holder.set_permission(Node::inheritance("vip").server("lobby").build());
        holder.set_permission(Node::inheritance("banned").negated().build());

        assert_eq!(holder.weight(), Some(30));
        assert_eq!(holder.parent_groups(&QueryOptions::global()), vec!["default"]);
        assert_eq!(
            holder.parent_names().into_iter().collect::<Vec<_>>(),
            vec!["default", "vip"]
        );
    }

    #[test]
    fn export_and_import() {
        let source = holder();
        source.set_permission(Node::builder("a").server("lobby").build());
        source.set_permission(Node::prefix(5, "[x]").negated().build());

        let exported = source.export_nodes();
        let target = holder();
        let added = target
            .import_nodes(exported.iter().map(|(key, value)| (key.as_str(), *value)))
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(target.enduring_nodes(), source.enduring_nodes());

        assert!(target.import_nodes([("(broken", true)]).is_err());
    }
}
