// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loading and saving of users, groups and tracks against a store backend.
use std::collections::BTreeSet;
use std::error::Error;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use warden_auth::{DEFAULT_GROUP, Group, HolderId, LoadedTrack, PermissionHolder, Registry, User};
use warden_core::{Log, LogEntry, Node, Track, UserId};

use crate::reconcile::{Changes, reconcile};
use crate::record::NodeRecord;
use crate::traits::{Store, Transaction};
use crate::users::UserData;
use crate::uuids::MappingResult;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading from or writing to the store backend failed.
    #[error("storage backend failed: {0}")]
    Backend(#[source] Box<dyn Error + Send + Sync>),

    #[error("group '{0}' does not exist")]
    GroupMissing(String),

    #[error("track '{0}' does not exist")]
    TrackMissing(String),
}

fn backend<E>(err: E) -> StorageError
where
    E: Error + Send + Sync + 'static,
{
    StorageError::Backend(Box::new(err))
}

/// Keeps loaded holders and tracks consistent with a store backend.
///
/// Every load and save of a holder holds its I/O lock across reading the persisted records,
/// computing the difference and writing it, so concurrent saves of one holder never work with a
/// stale snapshot. Writes of one save are applied in one transaction, a failed save leaves the
/// loaded holder untouched and can be retried.
#[derive(Clone, Debug)]
pub struct Storage<S> {
    store: S,
    default_group: String,
}

impl<S> Storage<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            default_group: DEFAULT_GROUP.to_string(),
        }
    }

    /// Sets the group every user is a member of when nothing else was stored.
    pub fn default_group(mut self, name: &str) -> Self {
        self.default_group = name.trim().to_lowercase();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs store operations in one transaction, rolling back on error.
    async fn transaction<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: AsyncFnOnce(&S) -> Result<R, <S as Transaction>::Error>,
    {
        let permit = self.store.begin().await.map_err(backend)?;
        match f(&self.store).await {
            Ok(result) => {
                self.store.commit(permit).await.map_err(backend)?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback(permit).await {
                    warn!(%rollback_err, "rollback after failed storage operation failed");
                }
                Err(backend(err))
            }
        }
    }

    /// Reads the persisted records of a holder.
    async fn records(&self, holder: &HolderId) -> Result<BTreeSet<NodeRecord>, StorageError> {
        self.transaction(async |store| store.node_records(holder).await)
            .await
    }

    /// Reconciles the persisted records of a holder with its enduring nodes.
    ///
    /// The caller holds the I/O lock of the holder.
    async fn write_nodes<F>(
        &self,
        holder: &PermissionHolder,
        extra: F,
    ) -> Result<Changes, StorageError>
    where
        F: AsyncFnOnce(&S) -> Result<(), <S as Transaction>::Error>,
    {
        let desired = encode_nodes(holder);
        let changes = self
            .transaction(async |store| {
                let persisted = store.node_records(holder.id()).await?;
                let changes = reconcile(&persisted, &desired);
                if !changes.is_empty() {
                    store.apply_changes(holder.id(), &changes).await?;
                }
                extra(store).await?;
                Ok(changes)
            })
            .await?;

        debug!(
            holder = %holder.id(),
            inserted = changes.to_insert.len(),
            deleted = changes.to_delete.len(),
            "saved nodes"
        );
        Ok(changes)
    }

    /// Loads a user into the registry.
    ///
    /// Users without stored data become members of the default group. Malformed records are
    /// skipped. Expired nodes are removed and the user is saved again if that changed anything.
    pub async fn load_user(
        &self,
        registry: &Registry,
        id: UserId,
        username: Option<&str>,
    ) -> Result<Arc<User>, StorageError> {
        let user = registry.load_user(id);
        {
            let _guard = user.lock_io().await;
            let holder = user.holder().id().clone();
            let (records, data) = self
                .transaction(async |store| {
                    let records = store.node_records(&holder).await?;
                    let data = store.user_data(id).await?;
                    Ok((records, data))
                })
                .await?;

            user.set_nodes(decode_records(&holder, &records));
            match data {
                Some(data) => {
                    user.set_primary_group(&data.primary_group);
                    if username.is_none() {
                        user.set_username(data.username.as_deref());
                    }
                }
                None => user.set_primary_group(&self.default_group),
            }
            if let Some(username) = username
                && !user.set_username(Some(username))
            {
                warn!(user = %id, username, "username rejected");
            }

            user.give_default_if_needed(&self.default_group);
            if user.audit_temporary_nodes() {
                self.save_user_locked(&user).await?;
            }
            debug!(user = %id, nodes = records.len(), "loaded user");
        }
        Ok(user)
    }

    /// Persists the enduring nodes and data of a user.
    ///
    /// Users holding nothing but the default group membership have their records removed.
    pub async fn save_user(&self, user: &User) -> Result<(), StorageError> {
        let _guard = user.lock_io().await;
        self.save_user_locked(user).await
    }

    async fn save_user_locked(&self, user: &User) -> Result<(), StorageError> {
        let id = user.id();
        let data = UserData {
            username: user.username().map(|name| name.to_lowercase()),
            primary_group: user.stored_primary_group(),
        };

        if user.is_default(&self.default_group) {
            let holder = user.holder().id().clone();
            let removed = self
                .transaction(async |store| {
                    let removed = store.delete_nodes(&holder).await?;
                    store.upsert_user(id, &data).await?;
                    Ok(removed)
                })
                .await?;
            debug!(user = %id, removed, "saved default user");
            return Ok(());
        }

        self.write_nodes(user.holder(), async |store| {
            store.upsert_user(id, &data).await
        })
        .await?;
        Ok(())
    }

    /// Creates a group if it does not exist yet and loads it.
    pub async fn create_and_load_group(
        &self,
        registry: &Registry,
        name: &str,
    ) -> Result<Arc<Group>, StorageError> {
        let group = registry.load_group(name);
        {
            let _guard = group.lock_io().await;
            let holder = group.holder().id().clone();
            let (created, records) = self
                .transaction(async |store| {
                    let created = store.insert_group(group.name()).await?;
                    let records = store.node_records(&holder).await?;
                    Ok((created, records))
                })
                .await?;
            if created {
                debug!(group = group.name(), "created group");
            }
            self.apply_loaded_group(&group, &holder, &records).await?;
        }
        Ok(group)
    }

    /// Loads a stored group, returns `None` if it does not exist.
    pub async fn load_group(
        &self,
        registry: &Registry,
        name: &str,
    ) -> Result<Option<Arc<Group>>, StorageError> {
        let name = name.trim().to_lowercase();
        let exists = self
            .transaction(async |store| store.has_group(&name).await)
            .await?;
        if !exists {
            return Ok(None);
        }

        let group = registry.load_group(&name);
        {
            let _guard = group.lock_io().await;
            let holder = group.holder().id().clone();
            let records = self.records(&holder).await?;
            self.apply_loaded_group(&group, &holder, &records).await?;
        }
        Ok(Some(group))
    }

    async fn apply_loaded_group(
        &self,
        group: &Group,
        holder: &HolderId,
        records: &BTreeSet<NodeRecord>,
    ) -> Result<(), StorageError> {
        group.set_nodes(decode_records(holder, records));
        if group.audit_temporary_nodes() {
            self.write_nodes(group.holder(), async |_| Ok(())).await?;
        }
        debug!(group = group.name(), nodes = records.len(), "loaded group");
        Ok(())
    }

    /// Loads every stored group and unloads groups which are not stored anymore.
    pub async fn load_all_groups(&self, registry: &Registry) -> Result<Vec<Arc<Group>>, StorageError> {
        let names = self
            .transaction(async |store| store.group_names().await)
            .await?;

        let mut groups = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(group) = self.load_group(registry, name).await? {
                groups.push(group);
            }
        }

        for group in registry.groups() {
            if !names.contains(group.name()) {
                debug!(group = group.name(), "unloading group missing in storage");
                registry.unload_group(group.name());
            }
        }
        Ok(groups)
    }

    /// Persists the enduring nodes of a group.
    pub async fn save_group(&self, group: &Group) -> Result<(), StorageError> {
        let _guard = group.lock_io().await;
        let name = group.name().to_string();
        self.write_nodes(group.holder(), async |store| {
            store.insert_group(&name).await.map(|_| ())
        })
        .await?;
        Ok(())
    }

    /// Removes a group with all its records and unloads it.
    pub async fn delete_group(&self, registry: &Registry, group: &Group) -> Result<(), StorageError> {
        {
            let _guard = group.lock_io().await;
            let holder = group.holder().id().clone();
            let existed = self
                .transaction(async |store| {
                    store.delete_nodes(&holder).await?;
                    store.delete_group(group.name()).await
                })
                .await?;
            if !existed {
                return Err(StorageError::GroupMissing(group.name().to_string()));
            }
        }
        registry.unload_group(group.name());
        debug!(group = group.name(), "deleted group");
        Ok(())
    }

    /// Creates a track if it does not exist yet and loads it.
    pub async fn create_and_load_track(
        &self,
        registry: &Registry,
        name: &str,
    ) -> Result<Arc<LoadedTrack>, StorageError> {
        let track = registry.load_track(name);
        {
            let _guard = track.lock_io().await;
            let name = track.read().name().to_string();
            let groups = self
                .transaction(async |store| match store.track_groups(&name).await? {
                    Some(groups) => Ok(groups),
                    None => {
                        store.upsert_track(&name, &[]).await?;
                        Ok(Vec::new())
                    }
                })
                .await?;
            *track.write() = Track::from_groups(&name, groups);
        }
        Ok(track)
    }

    /// Loads a stored track, returns `None` if it does not exist.
    pub async fn load_track(
        &self,
        registry: &Registry,
        name: &str,
    ) -> Result<Option<Arc<LoadedTrack>>, StorageError> {
        let name = name.trim().to_lowercase();
        let Some(groups) = self
            .transaction(async |store| store.track_groups(&name).await)
            .await?
        else {
            return Ok(None);
        };

        let track = registry.load_track(&name);
        {
            let _guard = track.lock_io().await;
            *track.write() = Track::from_groups(&name, groups);
        }
        debug!(track = %name, "loaded track");
        Ok(Some(track))
    }

    /// Loads every stored track and unloads tracks which are not stored anymore.
    pub async fn load_all_tracks(
        &self,
        registry: &Registry,
    ) -> Result<Vec<Arc<LoadedTrack>>, StorageError> {
        let names = self
            .transaction(async |store| store.track_names().await)
            .await?;

        let mut tracks = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(track) = self.load_track(registry, name).await? {
                tracks.push(track);
            }
        }

        for track in registry.tracks() {
            let name = track.read().name().to_string();
            if !names.contains(&name) {
                registry.unload_track(&name);
            }
        }
        Ok(tracks)
    }

    pub async fn save_track(&self, track: &LoadedTrack) -> Result<(), StorageError> {
        let _guard = track.lock_io().await;
        let snapshot = track.snapshot();
        self.transaction(async |store| {
            store
                .upsert_track(snapshot.name(), snapshot.groups())
                .await
        })
        .await?;
        debug!(track = snapshot.name(), groups = snapshot.size(), "saved track");
        Ok(())
    }

    /// Removes a track and unloads it.
    pub async fn delete_track(
        &self,
        registry: &Registry,
        track: &LoadedTrack,
    ) -> Result<(), StorageError> {
        let name = track.read().name().to_string();
        {
            let _guard = track.lock_io().await;
            let existed = self
                .transaction(async |store| store.delete_track(&name).await)
                .await?;
            if !existed {
                return Err(StorageError::TrackMissing(name));
            }
        }
        registry.unload_track(&name);
        debug!(track = %name, "deleted track");
        Ok(())
    }

    pub async fn log_action(&self, entry: &LogEntry) -> Result<(), StorageError> {
        self.transaction(async |store| store.insert_action(entry).await)
            .await
    }

    pub async fn get_log(&self) -> Result<Log, StorageError> {
        let entries = self
            .transaction(async |store| store.actions().await)
            .await?;
        Ok(Log::new(entries))
    }

    /// Maps a username to a user, usernames are case-insensitive.
    pub async fn save_uuid_mapping(
        &self,
        username: &str,
        id: UserId,
    ) -> Result<MappingResult, StorageError> {
        let username = username.trim().to_lowercase();
        let result = self
            .transaction(async |store| store.save_mapping(&username, id).await)
            .await?;
        if let Some(displaced) = result.displaced {
            debug!(username = %username, user = %id, %displaced, "username taken over");
        }
        Ok(result)
    }

    pub async fn lookup_uuid(&self, username: &str) -> Result<Option<UserId>, StorageError> {
        let username = username.trim().to_lowercase();
        self.transaction(async |store| store.uuid_for(&username).await)
            .await
    }

    pub async fn lookup_username(&self, id: UserId) -> Result<Option<String>, StorageError> {
        self.transaction(async |store| store.username_for(id).await)
            .await
    }

    /// Users with at least one persisted node.
    pub async fn unique_users(&self) -> Result<BTreeSet<UserId>, StorageError> {
        self.transaction(async |store| store.user_holders().await)
            .await
    }
}

fn encode_nodes(holder: &PermissionHolder) -> BTreeSet<NodeRecord> {
    holder
        .enduring_nodes()
        .iter()
        .map(NodeRecord::from)
        .collect()
}

/// Converts persisted records into nodes, skipping malformed ones.
fn decode_records(holder: &HolderId, records: &BTreeSet<NodeRecord>) -> Vec<Node> {
    records
        .iter()
        .filter_map(|record| match Node::try_from(record) {
            Ok(node) => Some(node),
            Err(err) => {
                warn!(%holder, %record, %err, "skipping malformed node record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use uuid::Uuid;
    use warden_auth::{HolderId, Registry};
    use warden_core::{
        ContextSet, Equality, LogEntry, MutateResult, Node, QueryOptions, Timestamp, Tristate,
    };

    use crate::nodes::NodeStore;
    use crate::reconcile::reconcile;
    use crate::record::NodeRecord;
    use crate::storage::StorageError;
    use crate::traits::Transaction;
    use crate::users::UserStore;
    use crate::{MemoryStore, Storage};

    #[tokio::test]
    async fn new_users_get_default_group() {
        crate::assert_all_storages!(|storage| async {
            let registry = Registry::default();
            let id = Uuid::from_u128(1);

            let user = storage.load_user(&registry, id, Some("Notch")).await.unwrap();
            assert!(user.has_node(&Node::inheritance("default").build(), Equality::Exact));
            assert_eq!(user.stored_primary_group(), "default");
            assert_eq!(user.username().as_deref(), Some("Notch"));

            // Default users leave no records behind.
            storage.save_user(&user).await.unwrap();
            assert!(storage.unique_users().await.unwrap().is_empty());
        });
    }

    #[tokio::test]
    async fn save_and_reload_user() {
        crate::assert_all_storages!(|storage| async {
            let id = Uuid::from_u128(2);
            let lobby = ContextSet::singleton("server", "lobby");

            {
                let registry = Registry::default();
                let user = storage.load_user(&registry, id, Some("alice")).await.unwrap();
                user.set_permission(Node::builder("fly").context(&lobby).build());
                user.set_permission(Node::inheritance("vip").build());
                user.set_primary_group("vip");
                user.set_transient_permission(Node::builder("session.only").build());
                storage.save_user(&user).await.unwrap();
            }

            let registry = Registry::default();
            let user = storage.load_user(&registry, id, None).await.unwrap();
            assert_eq!(user.enduring_nodes().len(), 3);
            assert!(user.has_node(&Node::builder("fly").context(&lobby).build(), Equality::Exact));
            assert!(user.transient_nodes().is_empty());
            assert_eq!(user.stored_primary_group(), "vip");
            assert_eq!(user.username().as_deref(), Some("alice"));
            assert_eq!(
                storage.unique_users().await.unwrap(),
                BTreeSet::from([id])
            );

            // Removing the extra nodes turns the user into a default one again.
            user.unset_permission(&Node::builder("fly").context(&lobby).build());
            user.unset_permission(&Node::inheritance("vip").build());
            user.set_primary_group("default");
            storage.save_user(&user).await.unwrap();
            assert!(storage.unique_users().await.unwrap().is_empty());
        });
    }

    #[tokio::test]
    async fn saves_write_minimal_changes() {
        let store = MemoryStore::default();
        let storage = Storage::new(store.clone());
        let registry = Registry::default();
        let group = storage.create_and_load_group(&registry, "admin").await.unwrap();

        for key in ["a", "b", "c"] {
            group.set_permission(Node::builder(key).build());
        }
        storage.save_group(&group).await.unwrap();

        assert_eq!(
            group.set_permission(Node::builder("d").build()),
            MutateResult::Success
        );
        group.unset_permission(&Node::builder("a").build());

        let permit = store.begin().await.unwrap();
        let persisted = store.node_records(group.holder().id()).await.unwrap();
        let changes = reconcile(
            &persisted,
            &group.enduring_nodes().iter().map(NodeRecord::from).collect(),
        );
        store.commit(permit).await.unwrap();
        assert_eq!(changes.to_insert.len(), 1);
        assert_eq!(changes.to_delete.len(), 1);

        storage.save_group(&group).await.unwrap();
        let permit = store.begin().await.unwrap();
        let persisted = store.node_records(group.holder().id()).await.unwrap();
        store.commit(permit).await.unwrap();
        assert_eq!(persisted.len(), 3);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let store = MemoryStore::default();
        let id = Uuid::from_u128(3);
        let holder = HolderId::User(id);

        let mut broken = NodeRecord::from(&Node::builder("fly").build());
        broken.contexts = "(server=".into();
        let valid = NodeRecord::from(&Node::inheritance("vip").build());

        let permit = store.begin().await.unwrap();
        store
            .apply_changes(
                &holder,
                &reconcile(&BTreeSet::new(), &BTreeSet::from([broken, valid])),
            )
            .await
            .unwrap();
        store.commit(permit).await.unwrap();

        let storage = Storage::new(store);
        let registry = Registry::default();
        let user = storage.load_user(&registry, id, None).await.unwrap();
        assert_eq!(user.enduring_nodes(), vec![Node::inheritance("vip").build()]);
    }

    #[tokio::test]
    async fn expired_nodes_are_removed_on_load() {
        let store = MemoryStore::default();
        let storage = Storage::new(store.clone());
        let id = Uuid::from_u128(4);

        {
            let registry = Registry::default();
            let user = storage.load_user(&registry, id, None).await.unwrap();
            // Expired long ago.
            user.set_permission(Node::builder("fly").expiry(Timestamp::new(500)).build());
            user.set_permission(Node::builder("build").build());
            storage.save_user(&user).await.unwrap();
        }

        let registry = Registry::default();
        let user = storage.load_user(&registry, id, None).await.unwrap();
        assert!(!user.has_node(
            &Node::builder("fly").expiry(Timestamp::new(500)).build(),
            Equality::Exact
        ));

        // The removal was persisted as well.
        let permit = store.begin().await.unwrap();
        let persisted = store.node_records(&HolderId::User(id)).await.unwrap();
        assert!(store.user_data(id).await.unwrap().is_some());
        store.commit(permit).await.unwrap();
        assert_eq!(persisted.len(), 2);
    }

    #[tokio::test]
    async fn groups_and_inheritance() {
        crate::assert_all_storages!(|storage| async {
            {
                let registry = Registry::default();
                let default = storage.create_and_load_group(&registry, "default").await.unwrap();
                default.set_permission(Node::builder("chat.basic").build());
                storage.save_group(&default).await.unwrap();

                let admin = storage.create_and_load_group(&registry, "Admin").await.unwrap();
                admin.set_permission(Node::inheritance("default").build());
                admin.set_permission(Node::builder("chat.admin").build());
                storage.save_group(&admin).await.unwrap();
            }

            let registry = Registry::default();
            let groups = storage.load_all_groups(&registry).await.unwrap();
            assert_eq!(groups.len(), 2);
            assert!(storage.load_group(&registry, "missing").await.unwrap().is_none());

            let user = storage
                .load_user(&registry, Uuid::from_u128(5), None)
                .await
                .unwrap();
            user.set_permission(Node::inheritance("admin").build());

            let global = QueryOptions::global();
            assert_eq!(registry.check(&user, "chat.basic", &global), Tristate::True);
            assert_eq!(registry.check(&user, "chat.admin", &global), Tristate::True);
            assert_eq!(
                registry.check(&user, "chat.moderator", &global),
                Tristate::Undefined
            );
        });
    }

    #[tokio::test]
    async fn delete_groups() {
        crate::assert_all_storages!(|storage| async {
            let registry = Registry::default();
            let group = storage.create_and_load_group(&registry, "builder").await.unwrap();
            group.set_permission(Node::builder("build").build());
            storage.save_group(&group).await.unwrap();

            storage.delete_group(&registry, &group).await.unwrap();
            assert!(registry.group("builder").is_none());
            assert!(storage.load_group(&registry, "builder").await.unwrap().is_none());
            assert!(matches!(
                storage.delete_group(&registry, &group).await,
                Err(StorageError::GroupMissing(_))
            ));

            // Groups deleted elsewhere are unloaded by a full load.
            let other = storage.create_and_load_group(&registry, "other").await.unwrap();
            storage.delete_group(&Registry::default(), &other).await.unwrap();
            registry.load_group("other");
            storage.load_all_groups(&registry).await.unwrap();
            assert!(registry.group("other").is_none());
        });
    }

    #[tokio::test]
    async fn tracks() {
        crate::assert_all_storages!(|storage| async {
            let registry = Registry::default();
            let track = storage.create_and_load_track(&registry, "staff").await.unwrap();
            assert_eq!(track.read().size(), 0);
            track.write().append_group("helper");
            track.write().append_group("mod");
            storage.save_track(&track).await.unwrap();

            let registry = Registry::default();
            assert!(storage.load_track(&registry, "missing").await.unwrap().is_none());
            let tracks = storage.load_all_tracks(&registry).await.unwrap();
            assert_eq!(tracks.len(), 1);
            let track = registry.track("staff").unwrap();
            assert_eq!(track.read().groups(), ["helper", "mod"]);

            storage.delete_track(&registry, &track).await.unwrap();
            assert!(registry.track("staff").is_none());
            assert!(matches!(
                storage.delete_track(&registry, &track).await,
                Err(StorageError::TrackMissing(_))
            ));
        });
    }

    #[tokio::test]
    async fn action_log() {
        crate::assert_all_storages!(|storage| async {
            let actor = Uuid::from_u128(9);
            for (time, action) in [(10, "first"), (20, "second")] {
                storage
                    .log_action(
                        &LogEntry::builder()
                            .timestamp(Timestamp::new(time))
                            .actor(actor, "alice")
                            .group("admin")
                            .action(action)
                            .build(),
                    )
                    .await
                    .unwrap();
            }

            let log = storage.get_log().await.unwrap();
            assert_eq!(log.len(), 2);
            assert_eq!(log.actor_history(actor).len(), 2);
            assert_eq!(log.group_history("ADMIN").len(), 2);
            assert_eq!(log.search("second").len(), 1);
        });
    }

    #[tokio::test]
    async fn uuid_cache() {
        crate::assert_all_storages!(|storage| async {
            let id = Uuid::from_u128(10);
            assert!(storage.save_uuid_mapping(" Notch ", id).await.unwrap().is_clean());
            assert_eq!(storage.lookup_uuid("NOTCH").await.unwrap(), Some(id));
            assert_eq!(
                storage.lookup_username(id).await.unwrap().as_deref(),
                Some("notch")
            );
            assert_eq!(storage.lookup_uuid("jeb").await.unwrap(), None);
        });
    }
}
