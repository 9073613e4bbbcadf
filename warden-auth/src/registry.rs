// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loaded users, groups and tracks together with their resolved data cache.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};
use warden_core::{QueryOptions, Track, Tristate, UserId};

use crate::buffer::DebounceBuffer;
use crate::cache::ResolvedDataCache;
use crate::calculator::PermissionData;
use crate::config::ResolverConfiguration;
use crate::graph::GroupGraph;
use crate::group::{Group, GroupLookup};
use crate::holder::{HolderId, PermissionHolder};
use crate::meta::{MetaAccumulator, MetaData};
use crate::primary_group;
use crate::resolver::{InheritanceResolver, LocalizedNode};
use crate::user::User;

/// Drops cached results when a holder changed.
///
/// Every holder managed by a [`Registry`] carries one. A changed user only drops its own entries.
/// A changed group drops its own entries and those of every group inheriting from it right away,
/// the entries of all users are dropped through the debounce buffer.
#[derive(Clone, Debug)]
pub(crate) struct Invalidator {
    cache: Arc<ResolvedDataCache>,
    graph: Arc<RwLock<GroupGraph>>,
    buffer: DebounceBuffer,
}

impl Invalidator {
    pub(crate) fn holder_changed(&self, holder: &PermissionHolder) {
        let HolderId::Group(name) = holder.id() else {
            self.cache.invalidate_holder(holder.id());
            return;
        };

        let dependents = {
            let mut graph = self.graph.write().expect("acquire exclusive write access on graph");
            graph.set_parents(name, &holder.parent_names());
            graph.dependents(name)
        };

        self.cache.invalidate_holder(holder.id());
        for dependent in dependents {
            self.cache.invalidate_holder(&HolderId::Group(dependent));
        }

        // Any user might inherit from this group.
        drop(self.buffer.request());
    }
}

/// Track together with the lock guarding its persistence.
#[derive(Debug)]
pub struct LoadedTrack {
    track: RwLock<Track>,
    io_lock: Mutex<()>,
}

impl LoadedTrack {
    fn new(name: &str) -> Self {
        Self {
            track: RwLock::new(Track::new(name)),
            io_lock: Mutex::new(()),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Track> {
        self.track.read().expect("acquire shared read access on track")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Track> {
        self.track.write().expect("acquire exclusive write access on track")
    }

    /// Copy of the current state of the track.
    pub fn snapshot(&self) -> Track {
        self.read().clone()
    }

    /// Acquires the persistence lock of this track.
    pub async fn lock_io(&self) -> MutexGuard<'_, ()> {
        self.io_lock.lock().await
    }
}

/// Explicit registry of everything loaded into memory.
///
/// Holders are created on first load and live until they are unloaded. Permission and meta
/// queries are answered from the shared [`ResolvedDataCache`] which is kept consistent with
/// mutations of the registered holders.
#[derive(Debug)]
pub struct Registry {
    users: RwLock<HashMap<UserId, Arc<User>>>,
    groups: RwLock<HashMap<String, Arc<Group>>>,
    tracks: RwLock<HashMap<String, Arc<LoadedTrack>>>,
    invalidator: Invalidator,
    config: ResolverConfiguration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(ResolverConfiguration::default())
    }
}

impl Registry {
    pub fn new(config: ResolverConfiguration) -> Self {
        let cache = Arc::new(ResolvedDataCache::new());
        let buffer = DebounceBuffer::new(config.refresh_debounce, {
            let cache = cache.clone();
            move || {
                let invalidated = cache.invalidate_users();
                debug!(invalidated, "refreshed user caches");
            }
        });

        Self {
            users: RwLock::default(),
            groups: RwLock::default(),
            tracks: RwLock::default(),
            invalidator: Invalidator {
                cache,
                graph: Arc::default(),
                buffer,
            },
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfiguration {
        &self.config
    }

    pub fn cache(&self) -> &ResolvedDataCache {
        &self.invalidator.cache
    }

    fn read_users(&self) -> RwLockReadGuard<'_, HashMap<UserId, Arc<User>>> {
        self.users.read().expect("acquire shared read access on users")
    }

    fn write_users(&self) -> RwLockWriteGuard<'_, HashMap<UserId, Arc<User>>> {
        self.users.write().expect("acquire exclusive write access on users")
    }

    fn read_groups(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Group>>> {
        self.groups.read().expect("acquire shared read access on groups")
    }

    fn write_groups(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Group>>> {
        self.groups.write().expect("acquire exclusive write access on groups")
    }

    fn read_tracks(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<LoadedTrack>>> {
        self.tracks.read().expect("acquire shared read access on tracks")
    }

    fn write_tracks(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<LoadedTrack>>> {
        self.tracks.write().expect("acquire exclusive write access on tracks")
    }

    /// Returns the loaded user or registers a new one without any nodes.
    pub fn load_user(&self, id: UserId) -> Arc<User> {
        let mut users = self.write_users();
        users
            .entry(id)
            .or_insert_with(|| {
                let user = User::new(id, &self.config.default_group);
                user.attach(self.invalidator.clone());
                trace!(user = %id, "user registered");
                Arc::new(user)
            })
            .clone()
    }

    pub fn user(&self, id: UserId) -> Option<Arc<User>> {
        self.read_users().get(&id).cloned()
    }

    pub fn users(&self) -> Vec<Arc<User>> {
        self.read_users().values().cloned().collect()
    }

    /// Removes a user and its cached results.
    pub fn unload_user(&self, id: UserId) -> Option<Arc<User>> {
        let user = self.write_users().remove(&id)?;
        self.cache().invalidate_holder(user.holder().id());
        Some(user)
    }

    /// Returns the loaded group or registers a new one without any nodes.
    pub fn load_group(&self, name: &str) -> Arc<Group> {
        let name = name.trim().to_lowercase();
        let (group, created) = {
            let mut groups = self.write_groups();
            match groups.get(&name) {
                Some(group) => (group.clone(), false),
                None => {
                    let group = Arc::new(Group::new(&name));
                    group.attach(self.invalidator.clone());
                    groups.insert(name.clone(), group.clone());
                    (group, true)
                }
            }
        };

        // Holders referencing the group before it was known skipped it.
        if created {
            trace!(group = %name, "group registered");
            group.invalidate();
        }
        group
    }

    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.read_groups().get(&name.trim().to_lowercase()).cloned()
    }

    pub fn groups(&self) -> Vec<Arc<Group>> {
        self.read_groups().values().cloned().collect()
    }

    /// Removes a group, holders inheriting from it skip it from now on.
    pub fn unload_group(&self, name: &str) -> Option<Arc<Group>> {
        let name = name.trim().to_lowercase();
        let group = self.write_groups().remove(&name)?;

        let dependents = {
            let mut graph = self
                .invalidator
                .graph
                .write()
                .expect("acquire exclusive write access on graph");
            graph.remove(&name);
            graph.dependents(&name)
        };
        self.cache().invalidate_holder(group.holder().id());
        for dependent in dependents {
            self.cache().invalidate_holder(&HolderId::Group(dependent));
        }
        drop(self.refresh_users());
        Some(group)
    }

    /// Loads the configured default group.
    pub fn ensure_default_group(&self) -> Arc<Group> {
        self.load_group(&self.config.default_group)
    }

    /// Returns the loaded track or registers a new empty one.
    pub fn load_track(&self, name: &str) -> Arc<LoadedTrack> {
        let name = name.trim().to_lowercase();
        self.write_tracks()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(LoadedTrack::new(&name)))
            .clone()
    }

    pub fn track(&self, name: &str) -> Option<Arc<LoadedTrack>> {
        self.read_tracks().get(&name.trim().to_lowercase()).cloned()
    }

    pub fn tracks(&self) -> Vec<Arc<LoadedTrack>> {
        self.read_tracks().values().cloned().collect()
    }

    pub fn unload_track(&self, name: &str) -> Option<Arc<LoadedTrack>> {
        self.write_tracks().remove(&name.trim().to_lowercase())
    }

    /// Resolves the nodes of a holder and its ancestors under the query, bypassing the cache.
    pub fn resolve(&self, holder: &PermissionHolder, query: &QueryOptions) -> Vec<LocalizedNode> {
        InheritanceResolver::new(self).resolve(holder, query)
    }

    /// Resolves all nodes of a holder and its ancestors regardless of context.
    pub fn resolve_all(&self, holder: &PermissionHolder) -> Vec<LocalizedNode> {
        InheritanceResolver::new(self).resolve_all(holder)
    }

    /// Cached permission data of a holder for the query.
    pub fn permission_data(
        &self,
        holder: &PermissionHolder,
        query: &QueryOptions,
    ) -> Arc<PermissionData> {
        self.cache()
            .get_or_compute_permissions(holder.id(), query, || {
                PermissionData::new(&self.resolve(holder, query))
                    .apply_wildcards(self.config.apply_wildcards)
                    .grant_undefined(query.is_op() && self.config.op_grants_undefined)
            })
    }

    /// Checks a permission of a holder.
    pub fn check(
        &self,
        holder: &PermissionHolder,
        permission: &str,
        query: &QueryOptions,
    ) -> Tristate {
        self.permission_data(holder, query).check(permission)
    }

    /// Cached meta data of a holder for the query.
    ///
    /// For registered users the result carries the effective primary group.
    pub fn meta_data(&self, holder: &PermissionHolder, query: &QueryOptions) -> Arc<MetaData> {
        self.cache()
            .get_or_compute_meta(holder.id(), query, || self.compute_meta(holder, query))
    }

    fn compute_meta(&self, holder: &PermissionHolder, query: &QueryOptions) -> MetaData {
        let resolved = self.resolve(holder, query);
        let mut accumulator = MetaAccumulator::new();
        accumulator.accumulate_all(&resolved);
        let meta = accumulator.complete();

        let HolderId::User(id) = holder.id() else {
            return meta;
        };
        let Some(user) = self.user(*id) else {
            return meta;
        };
        let primary = primary_group::calculate(
            self,
            &user,
            query,
            &resolved,
            &meta,
            self.config.primary_group_calculation,
            self.config.primary_group_override_requires_membership,
        );
        meta.with_primary_group(primary)
    }

    /// Effective primary group of a user.
    pub fn primary_group(&self, user: &User, query: &QueryOptions) -> String {
        self.meta_data(user, query)
            .primary_group()
            .map(str::to_string)
            .unwrap_or_else(|| user.stored_primary_group())
    }

    /// Requests the cached results of all users to be dropped.
    ///
    /// Requests arriving within the configured debounce window are coalesced, the returned future
    /// resolves once the covering refresh ran.
    pub fn refresh_users(&self) -> impl Future<Output = ()> + use<> {
        self.invalidator.buffer.request()
    }

    /// Drops the cached results of all users right away.
    pub fn refresh_users_now(&self) {
        self.invalidator.buffer.request_directly();
    }

    /// Removes expired nodes from all loaded holders, returns the holders which changed.
    pub fn audit_temporary_nodes(&self) -> Vec<HolderId> {
        let holders: Vec<HolderId> = self
            .users()
            .iter()
            .filter(|user| user.audit_temporary_nodes())
            .map(|user| user.holder().id().clone())
            .chain(
                self.groups()
                    .iter()
                    .filter(|group| group.audit_temporary_nodes())
                    .map(|group| group.holder().id().clone()),
            )
            .collect();
        if !holders.is_empty() {
            debug!(holders = holders.len(), "expired nodes removed");
        }
        holders
    }

    /// Groups of every inheritance cycle among the loaded groups.
    pub fn inheritance_cycles(&self) -> Vec<Vec<String>> {
        self.invalidator
            .graph
            .read()
            .expect("acquire shared read access on graph")
            .cycles()
    }
}

impl GroupLookup for Registry {
    fn group(&self, name: &str) -> Option<Arc<Group>> {
        Registry::group(self, name)
    }
}
