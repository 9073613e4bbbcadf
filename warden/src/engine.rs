// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::Deref;
use std::sync::Arc;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use warden_auth::promotion::{self, PromotionError, PromotionOutcome};
use warden_auth::{
    Group, HolderId, LoadedTrack, MetaData, PermissionHolder, Registry, TemporaryMergeBehaviour,
    User,
};
use warden_core::log::CONSOLE_ID;
use warden_core::{
    ContextSet, Log, LogEntry, LogEntryBuilder, MutateResult, Node, QueryOptions, Timestamp,
    TrackError, Tristate, UserId,
};
use warden_store::{SqliteError, SqliteStore, Storage, StorageError, Store};

use crate::builder::EngineBuilder;
use crate::config::EngineConfiguration;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sqlite(#[from] SqliteError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Promotion(#[from] PromotionError),

    #[error("user {0} is not loaded")]
    UserNotLoaded(UserId),

    #[error("group '{0}' is not loaded")]
    GroupNotLoaded(String),

    #[error("track '{0}' is not loaded")]
    TrackNotLoaded(String),
}

/// Whoever carries out a mutation, recorded in the action log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    id: UserId,
    name: String,
}

impl Actor {
    pub fn new(id: UserId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }

    pub fn console() -> Self {
        Self::new(CONSOLE_ID, "console")
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        let name = user.username().unwrap_or_else(|| user.id().to_string());
        Self::new(user.id(), &name)
    }
}

/// Loaded user or group a mutation or query is addressed to.
enum Loaded {
    User(Arc<User>),
    Group(Arc<Group>),
}

impl Loaded {
    fn log_entry(&self) -> LogEntryBuilder {
        match self {
            Loaded::User(user) => {
                let name = user.username().unwrap_or_else(|| user.id().to_string());
                LogEntry::builder().user(user.id(), &name)
            }
            Loaded::Group(group) => LogEntry::builder().group(group.name()),
        }
    }
}

impl Deref for Loaded {
    type Target = PermissionHolder;

    fn deref(&self) -> &Self::Target {
        match self {
            Loaded::User(user) => user.holder(),
            Loaded::Group(group) => group.holder(),
        }
    }
}

fn describe(node: &Node) -> String {
    format!("{} {}", node.to_legacy_key(), node.value())
}

fn describe_move(track: &str, outcome: &PromotionOutcome, context: &ContextSet) -> String {
    let (verb, from, to) = match outcome {
        PromotionOutcome::Promoted { from, to } => {
            ("promote", from.as_deref(), Some(to.as_str()))
        }
        PromotionOutcome::Demoted { from, to } => ("demote", Some(from.as_str()), to.as_deref()),
    };
    format!(
        "{verb} {track} {} -> {} {context}",
        from.unwrap_or("-"),
        to.unwrap_or("-")
    )
}

/// Permission engine keeping users, groups and tracks loaded and in sync with a store.
///
/// Mutations done through the engine are persisted right away and, if enabled, recorded in the
/// action log. Mutations which do not change anything (`AlreadyHas`, `Lacks`) are neither saved
/// nor logged.
pub struct Engine<S> {
    config: EngineConfiguration,
    registry: Registry,
    storage: Storage<S>,
}

impl Engine<SqliteStore> {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}

impl<S> Engine<S>
where
    S: Store,
{
    pub fn new(store: S, config: EngineConfiguration) -> Self {
        let storage = Storage::new(store).default_group(&config.resolver.default_group);
        Self {
            registry: Registry::new(config.resolver.clone()),
            storage,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfiguration {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    /// Creates the default group if needed and loads all stored groups and tracks.
    pub async fn load_all(&self) -> Result<(), EngineError> {
        self.storage
            .create_and_load_group(&self.registry, &self.config.resolver.default_group)
            .await?;
        let groups = self.storage.load_all_groups(&self.registry).await?;
        let tracks = self.storage.load_all_tracks(&self.registry).await?;
        debug!(groups = groups.len(), tracks = tracks.len(), "loaded groups and tracks");
        Ok(())
    }

    /// Loads a user, remembering its username if one is given.
    pub async fn load_user(
        &self,
        id: UserId,
        username: Option<&str>,
    ) -> Result<Arc<User>, EngineError> {
        if let Some(username) = username {
            self.storage.save_uuid_mapping(username, id).await?;
        }
        Ok(self.storage.load_user(&self.registry, id, username).await?)
    }

    pub fn user(&self, id: UserId) -> Result<Arc<User>, EngineError> {
        self.registry.user(id).ok_or(EngineError::UserNotLoaded(id))
    }

    pub async fn save_user(&self, id: UserId) -> Result<(), EngineError> {
        let user = self.user(id)?;
        self.storage.save_user(&user).await?;
        Ok(())
    }

    /// Unloads a user which is not needed anymore, returns false if it was not loaded.
    pub fn cleanup_user(&self, id: UserId) -> bool {
        let unloaded = self.registry.unload_user(id).is_some();
        if unloaded {
            debug!(user = %id, "user unloaded");
        }
        unloaded
    }

    pub fn group(&self, name: &str) -> Result<Arc<Group>, EngineError> {
        self.registry
            .group(name)
            .ok_or_else(|| EngineError::GroupNotLoaded(name.to_string()))
    }

    pub async fn create_group(
        &self,
        actor: &Actor,
        name: &str,
    ) -> Result<Arc<Group>, EngineError> {
        let group = self
            .storage
            .create_and_load_group(&self.registry, name)
            .await?;
        self.log(actor, LogEntry::builder().group(group.name()), "create")
            .await?;
        Ok(group)
    }

    pub async fn delete_group(&self, actor: &Actor, name: &str) -> Result<(), EngineError> {
        let group = self.group(name)?;
        self.storage.delete_group(&self.registry, &group).await?;
        self.log(actor, LogEntry::builder().group(group.name()), "delete")
            .await
    }

    pub fn track(&self, name: &str) -> Result<Arc<LoadedTrack>, EngineError> {
        self.registry
            .track(name)
            .ok_or_else(|| EngineError::TrackNotLoaded(name.to_string()))
    }

    pub async fn create_track(
        &self,
        actor: &Actor,
        name: &str,
    ) -> Result<Arc<LoadedTrack>, EngineError> {
        let track = self
            .storage
            .create_and_load_track(&self.registry, name)
            .await?;
        let name = track.read().name().to_string();
        self.log(actor, LogEntry::builder().track(&name), "create")
            .await?;
        Ok(track)
    }

    pub async fn delete_track(&self, actor: &Actor, name: &str) -> Result<(), EngineError> {
        let track = self.track(name)?;
        let name = track.read().name().to_string();
        self.storage.delete_track(&self.registry, &track).await?;
        self.log(actor, LogEntry::builder().track(&name), "delete")
            .await
    }

    fn holder(&self, target: &HolderId) -> Result<Loaded, EngineError> {
        match target {
            HolderId::User(id) => self.user(*id).map(Loaded::User),
            HolderId::Group(name) => self.group(name).map(Loaded::Group),
        }
    }

    async fn save(&self, holder: &Loaded) -> Result<(), StorageError> {
        match holder {
            Loaded::User(user) => self.storage.save_user(user).await,
            Loaded::Group(group) => self.storage.save_group(group).await,
        }
    }

    async fn log(
        &self,
        actor: &Actor,
        entry: LogEntryBuilder,
        action: &str,
    ) -> Result<(), EngineError> {
        if !self.config.log_actions {
            return Ok(());
        }
        let entry = entry
            .timestamp(Timestamp::now())
            .actor(actor.id, &actor.name)
            .action(action)
            .build();
        self.storage.log_action(&entry).await?;
        Ok(())
    }

    /// Persists and logs a successful mutation of a holder.
    async fn commit(
        &self,
        actor: &Actor,
        holder: &Loaded,
        result: MutateResult,
        action: &str,
    ) -> Result<MutateResult, EngineError> {
        if !result.was_success() {
            return Ok(result);
        }
        self.save(holder).await?;
        self.log(actor, holder.log_entry(), action).await?;
        Ok(result)
    }

    pub async fn set_permission(
        &self,
        actor: &Actor,
        target: &HolderId,
        node: Node,
    ) -> Result<MutateResult, EngineError> {
        let holder = self.holder(target)?;
        let action = format!("permission set {}", describe(&node));
        let result = holder.set_permission(node);
        self.commit(actor, &holder, result, &action).await
    }

    pub async fn set_temporary_permission(
        &self,
        actor: &Actor,
        target: &HolderId,
        node: Node,
        behaviour: TemporaryMergeBehaviour,
    ) -> Result<MutateResult, EngineError> {
        let holder = self.holder(target)?;
        let action = format!("permission settemp {}", describe(&node));
        let result = holder.set_temporary_permission(node, behaviour);
        self.commit(actor, &holder, result, &action).await
    }

    pub async fn unset_permission(
        &self,
        actor: &Actor,
        target: &HolderId,
        node: &Node,
    ) -> Result<MutateResult, EngineError> {
        let holder = self.holder(target)?;
        let result = holder.unset_permission(node);
        let action = format!("permission unset {}", node.to_legacy_key());
        self.commit(actor, &holder, result, &action).await
    }

    /// Adds a membership of a loaded group.
    pub async fn add_parent(
        &self,
        actor: &Actor,
        target: &HolderId,
        group: &str,
        context: &ContextSet,
    ) -> Result<MutateResult, EngineError> {
        let holder = self.holder(target)?;
        let group = self.group(group)?;
        let node = Node::inheritance(group.name()).context(context).build();
        let result = holder.set_permission(node);
        let action = format!("parent add {} {}", group.name(), context);
        self.commit(actor, &holder, result, &action).await
    }

    /// Removes every membership of the group in exactly the given context.
    pub async fn remove_parent(
        &self,
        actor: &Actor,
        target: &HolderId,
        group: &str,
        context: &ContextSet,
    ) -> Result<MutateResult, EngineError> {
        let holder = self.holder(target)?;
        let node = Node::inheritance(group).build();
        let result = holder.unset_permission_key(node.key(), context);

        if result.was_success()
            && let Loaded::User(user) = &holder
        {
            user.give_default_if_needed(&self.config.resolver.default_group);
        }
        let name = node.group_name().unwrap_or(group);
        let action = format!("parent remove {name} {context}");
        self.commit(actor, &holder, result, &action).await
    }

    /// Replaces all values of a meta key in the given context.
    pub async fn set_meta(
        &self,
        actor: &Actor,
        target: &HolderId,
        key: &str,
        value: &str,
        context: &ContextSet,
    ) -> Result<MutateResult, EngineError> {
        let holder = self.holder(target)?;
        let node = Node::meta(key, value).context(context).build();
        let result = holder.replace_meta(node);
        let action = format!("meta set {key} {value} {context}");
        self.commit(actor, &holder, result, &action).await
    }

    pub async fn unset_meta(
        &self,
        actor: &Actor,
        target: &HolderId,
        key: &str,
        context: &ContextSet,
    ) -> Result<MutateResult, EngineError> {
        let holder = self.holder(target)?;
        let result = match holder.clear_meta_keys(key, Some(context)) {
            0 => MutateResult::Lacks,
            _ => MutateResult::Success,
        };
        let action = format!("meta unset {key} {context}");
        self.commit(actor, &holder, result, &action).await
    }

    /// Removes all enduring nodes of a holder, restricted to one context if given.
    pub async fn clear_nodes(
        &self,
        actor: &Actor,
        target: &HolderId,
        context: Option<&ContextSet>,
    ) -> Result<usize, EngineError> {
        let holder = self.holder(target)?;
        let removed = holder.clear_nodes(context);
        if let Loaded::User(user) = &holder {
            user.give_default_if_needed(&self.config.resolver.default_group);
        }

        let result = match removed {
            0 => MutateResult::Lacks,
            _ => MutateResult::Success,
        };
        let action = match context {
            Some(context) => format!("clear {context}"),
            None => "clear".to_string(),
        };
        self.commit(actor, &holder, result, &action).await?;
        Ok(removed)
    }

    pub fn check(
        &self,
        target: &HolderId,
        permission: &str,
        query: &QueryOptions,
    ) -> Result<Tristate, EngineError> {
        let holder = self.holder(target)?;
        Ok(self.registry.check(&holder, permission, query))
    }

    pub fn meta(
        &self,
        target: &HolderId,
        query: &QueryOptions,
    ) -> Result<Arc<MetaData>, EngineError> {
        let holder = self.holder(target)?;
        Ok(self.registry.meta_data(&holder, query))
    }

    pub fn primary_group(&self, id: UserId, query: &QueryOptions) -> Result<String, EngineError> {
        let user = self.user(id)?;
        Ok(self.registry.primary_group(&user, query))
    }

    /// Appends a loaded group to the end of a track.
    pub async fn track_append(
        &self,
        actor: &Actor,
        track: &str,
        group: &str,
    ) -> Result<MutateResult, EngineError> {
        let track = self.track(track)?;
        let group = self.group(group)?;
        let result = track.write().append_group(group.name());
        let action = format!("append {}", group.name());
        self.commit_track(actor, &track, result, &action).await
    }

    pub async fn track_insert(
        &self,
        actor: &Actor,
        track: &str,
        group: &str,
        position: usize,
    ) -> Result<MutateResult, EngineError> {
        let track = self.track(track)?;
        let group = self.group(group)?;
        let result = track.write().insert_group(group.name(), position)?;
        let action = format!("insert {} {}", group.name(), position);
        self.commit_track(actor, &track, result, &action).await
    }

    pub async fn track_remove(
        &self,
        actor: &Actor,
        track: &str,
        group: &str,
    ) -> Result<MutateResult, EngineError> {
        let track = self.track(track)?;
        let group = group.trim().to_lowercase();
        let result = track.write().remove_group(&group);
        let action = format!("remove {group}");
        self.commit_track(actor, &track, result, &action).await
    }

    pub async fn track_clear(&self, actor: &Actor, track: &str) -> Result<(), EngineError> {
        let track = self.track(track)?;
        track.write().clear();
        self.commit_track(actor, &track, MutateResult::Success, "clear")
            .await?;
        Ok(())
    }

    async fn commit_track(
        &self,
        actor: &Actor,
        track: &LoadedTrack,
        result: MutateResult,
        action: &str,
    ) -> Result<MutateResult, EngineError> {
        if !result.was_success() {
            return Ok(result);
        }
        self.storage.save_track(track).await?;
        let name = track.read().name().to_string();
        self.log(actor, LogEntry::builder().track(&name), action)
            .await?;
        Ok(result)
    }

    /// Moves a user to the next group of a track in the given context.
    pub async fn promote(
        &self,
        actor: &Actor,
        id: UserId,
        track: &str,
        context: &ContextSet,
    ) -> Result<PromotionOutcome, EngineError> {
        let user = self.user(id)?;
        let track = self.track(track)?.snapshot();
        let outcome = promotion::promote(&self.registry, &user, &track, context)?;

        let holder = Loaded::User(user);
        self.save(&holder).await?;
        let action = describe_move(track.name(), &outcome, context);
        self.log(actor, holder.log_entry(), &action).await?;
        Ok(outcome)
    }

    /// Moves a user to the previous group of a track in the given context.
    pub async fn demote(
        &self,
        actor: &Actor,
        id: UserId,
        track: &str,
        context: &ContextSet,
    ) -> Result<PromotionOutcome, EngineError> {
        let user = self.user(id)?;
        let track = self.track(track)?.snapshot();
        let outcome = promotion::demote(&self.registry, &user, &track, context)?;
        user.give_default_if_needed(&self.config.resolver.default_group);

        let holder = Loaded::User(user);
        self.save(&holder).await?;
        let action = describe_move(track.name(), &outcome, context);
        self.log(actor, holder.log_entry(), &action).await?;
        Ok(outcome)
    }

    pub async fn get_log(&self) -> Result<Log, EngineError> {
        Ok(self.storage.get_log().await?)
    }

    /// Removes expired nodes from every loaded holder and persists the holders which changed.
    ///
    /// Returns the number of changed holders.
    pub async fn housekeeping(&self) -> Result<usize, EngineError> {
        let changed = self.registry.audit_temporary_nodes();
        for id in &changed {
            match id {
                HolderId::User(id) => {
                    if let Some(user) = self.registry.user(*id) {
                        user.give_default_if_needed(&self.config.resolver.default_group);
                        self.storage.save_user(&user).await?;
                    }
                }
                HolderId::Group(name) => {
                    if let Some(group) = self.registry.group(name) {
                        self.storage.save_group(&group).await?;
                    }
                }
            }
        }
        Ok(changed.len())
    }

    /// Runs [`housekeeping`](Self::housekeeping) in the configured interval until the returned
    /// future is dropped.
    ///
    /// Failed runs are logged and retried with the next tick.
    pub async fn run_housekeeping(&self) {
        let mut interval = tokio::time::interval(self.config.housekeeping_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.housekeeping().await {
                Ok(0) => (),
                Ok(changed) => debug!(holders = changed, "housekeeping removed expired nodes"),
                Err(err) => warn!(%err, "housekeeping failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;
    use warden_auth::{HolderId, PromotionOutcome, TemporaryMergeBehaviour};
    use warden_core::{ContextSet, Equality, MutateResult, Node, QueryOptions, Timestamp, Tristate};
    use warden_store::MemoryStore;

    use crate::config::EngineConfiguration;
    use crate::test_utils::setup_logging;

    use super::{Actor, Engine, EngineError};

    async fn engine(config: EngineConfiguration) -> Engine<MemoryStore> {
        setup_logging();
        let engine = Engine::new(MemoryStore::default(), config);
        engine.load_all().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn mutations_are_persisted_and_logged() {
        let engine = engine(EngineConfiguration::default()).await;
        let actor = Actor::console();
        let id = Uuid::new_v4();
        let user = HolderId::User(id);
        engine.load_user(id, Some("Alice")).await.unwrap();

        let fly = Node::builder("fly").build();
        assert_eq!(
            engine.set_permission(&actor, &user, fly.clone()).await.unwrap(),
            MutateResult::Success
        );
        assert_eq!(
            engine.set_permission(&actor, &user, fly.clone()).await.unwrap(),
            MutateResult::AlreadyHas
        );

        // Only the successful mutation is recorded.
        let log = engine.get_log().await.unwrap();
        assert_eq!(log.len(), 1);
        let entry = log.entries().next().unwrap();
        assert_eq!(entry.target(), Some(id));
        assert_eq!(entry.target_name(), "Alice");
        assert!(entry.action().starts_with("permission set fly"));

        // Unloading and loading again reads the saved nodes back.
        assert!(engine.cleanup_user(id));
        assert!(!engine.cleanup_user(id));
        assert!(matches!(
            engine.check(&user, "fly", &QueryOptions::global()),
            Err(EngineError::UserNotLoaded(_))
        ));
        engine.load_user(id, None).await.unwrap();
        assert_eq!(
            engine.check(&user, "fly", &QueryOptions::global()).unwrap(),
            Tristate::True
        );
        assert_eq!(
            engine.storage().lookup_uuid("ALICE").await.unwrap(),
            Some(id)
        );

        assert_eq!(
            engine.unset_permission(&actor, &user, &fly).await.unwrap(),
            MutateResult::Success
        );
        assert_eq!(
            engine.check(&user, "fly", &QueryOptions::global()).unwrap(),
            Tristate::Undefined
        );
        assert_eq!(engine.get_log().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn inheritance_and_meta() {
        let engine = engine(EngineConfiguration::default()).await;
        let actor = Actor::console();
        let admin = engine.create_group(&actor, "Admin").await.unwrap();
        let admin = admin.holder().id().clone();
        engine
            .set_permission(&actor, &admin, Node::builder("build.*").build())
            .await
            .unwrap();
        engine
            .set_meta(&actor, &admin, "color", "red", &ContextSet::empty())
            .await
            .unwrap();

        let id = Uuid::new_v4();
        let user = HolderId::User(id);
        engine.load_user(id, None).await.unwrap();
        assert!(matches!(
            engine
                .add_parent(&actor, &user, "owner", &ContextSet::empty())
                .await,
            Err(EngineError::GroupNotLoaded(_))
        ));
        assert_eq!(
            engine
                .add_parent(&actor, &user, "admin", &ContextSet::empty())
                .await
                .unwrap(),
            MutateResult::Success
        );

        let global = QueryOptions::global();
        assert_eq!(
            engine.check(&user, "build.place", &global).unwrap(),
            Tristate::True
        );
        let meta = engine.meta(&user, &global).unwrap();
        assert_eq!(meta.meta_value("color"), Some("red"));

        // Meta keys are replaced, not accumulated.
        engine
            .set_meta(&actor, &admin, "color", "blue", &ContextSet::empty())
            .await
            .unwrap();
        engine.registry().refresh_users().await;
        let meta = engine.meta(&user, &global).unwrap();
        assert_eq!(meta.meta_value("color"), Some("blue"));
        assert_eq!(
            engine
                .set_meta(&actor, &admin, "color", "blue", &ContextSet::empty())
                .await
                .unwrap(),
            MutateResult::AlreadyHas
        );

        assert_eq!(
            engine
                .remove_parent(&actor, &user, "admin", &ContextSet::empty())
                .await
                .unwrap(),
            MutateResult::Success
        );
        assert_eq!(
            engine.check(&user, "build.place", &global).unwrap(),
            Tristate::Undefined
        );
        assert_eq!(engine.user(id).unwrap().parent_names().len(), 1);

        assert_eq!(
            engine
                .unset_meta(&actor, &admin, "size", &ContextSet::empty())
                .await
                .unwrap(),
            MutateResult::Lacks
        );
        engine.delete_group(&actor, "admin").await.unwrap();
        assert!(matches!(
            engine.group("admin"),
            Err(EngineError::GroupNotLoaded(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_meta_updates_keep_one_value() {
        let engine = engine(EngineConfiguration::default()).await;
        let actor = Actor::console();
        let id = Uuid::new_v4();
        let user = HolderId::User(id);
        engine.load_user(id, None).await.unwrap();

        let global = ContextSet::empty();
        let (red, green, blue) = tokio::join!(
            engine.set_meta(&actor, &user, "color", "red", &global),
            engine.set_meta(&actor, &user, "color", "green", &global),
            engine.set_meta(&actor, &user, "color", "blue", &global),
        );
        for result in [red, green, blue] {
            assert_eq!(result.unwrap(), MutateResult::Success);
        }

        let colors = |engine: &Engine<MemoryStore>| {
            engine
                .user(id)
                .unwrap()
                .enduring_nodes()
                .into_iter()
                .filter(|node| node.meta_entry().is_some_and(|(key, _)| key == "color"))
                .count()
        };
        assert_eq!(colors(&engine), 1);

        // The stored copy agrees with memory.
        assert!(engine.cleanup_user(id));
        engine.load_user(id, None).await.unwrap();
        assert_eq!(colors(&engine), 1);
    }

    #[tokio::test]
    async fn promotion_along_track() {
        let engine = engine(EngineConfiguration::default()).await;
        let actor = Actor::console();
        for name in ["member", "mod", "admin"] {
            engine.create_group(&actor, name).await.unwrap();
        }
        engine.create_track(&actor, "staff").await.unwrap();
        for name in ["member", "mod", "admin"] {
            engine.track_append(&actor, "staff", name).await.unwrap();
        }
        assert_eq!(
            engine.track_append(&actor, "staff", "mod").await.unwrap(),
            MutateResult::AlreadyHas
        );

        let id = Uuid::new_v4();
        engine.load_user(id, None).await.unwrap();
        let global = ContextSet::empty();

        assert_eq!(
            engine.promote(&actor, id, "staff", &global).await.unwrap(),
            PromotionOutcome::Promoted {
                from: None,
                to: "member".into()
            }
        );
        assert_eq!(
            engine.promote(&actor, id, "staff", &global).await.unwrap(),
            PromotionOutcome::Promoted {
                from: Some("member".into()),
                to: "mod".into()
            }
        );
        assert_eq!(
            engine.demote(&actor, id, "staff", &global).await.unwrap(),
            PromotionOutcome::Demoted {
                from: "mod".into(),
                to: Some("member".into())
            }
        );
        assert!(matches!(
            engine.promote(&actor, id, "unknown", &global).await,
            Err(EngineError::TrackNotLoaded(_))
        ));

        let log = engine.get_log().await.unwrap();
        let actions: Vec<&str> = log
            .user_history(id)
            .into_iter()
            .map(|entry| entry.action())
            .collect();
        assert_eq!(actions.len(), 3);
        assert!(actions.contains(&"promote staff - -> member global"));
        assert!(actions.contains(&"promote staff member -> mod global"));
        assert!(actions.contains(&"demote staff mod -> member global"));
        assert_eq!(log.track_history("staff").len(), 4);

        // The promotion was saved.
        engine.cleanup_user(id);
        let user = engine.load_user(id, None).await.unwrap();
        assert!(user.parent_names().contains("member"));
    }

    #[tokio::test]
    async fn track_removal_and_clear() {
        let engine = engine(EngineConfiguration::default()).await;
        let actor = Actor::console();
        engine.create_group(&actor, "a").await.unwrap();
        engine.create_group(&actor, "b").await.unwrap();
        engine.create_group(&actor, "c").await.unwrap();
        engine.create_track(&actor, "ladder").await.unwrap();
        engine.track_append(&actor, "ladder", "a").await.unwrap();
        engine.track_insert(&actor, "ladder", "b", 0).await.unwrap();
        assert_eq!(engine.track("ladder").unwrap().read().groups(), ["b", "a"]);

        assert!(matches!(
            engine.track_insert(&actor, "ladder", "c", 7).await,
            Err(EngineError::Track(_))
        ));
        assert_eq!(
            engine.track_remove(&actor, "ladder", "c").await.unwrap(),
            MutateResult::Lacks
        );
        assert!(matches!(
            engine.track_append(&actor, "ladder", "d").await,
            Err(EngineError::GroupNotLoaded(_))
        ));
        engine.track_remove(&actor, "ladder", "b").await.unwrap();
        engine.track_clear(&actor, "ladder").await.unwrap();
        assert_eq!(engine.track("ladder").unwrap().read().size(), 0);

        engine.delete_track(&actor, "ladder").await.unwrap();
        assert!(engine.track("ladder").is_err());
    }

    #[tokio::test]
    async fn logging_can_be_disabled() {
        let engine = engine(EngineConfiguration::new().log_actions(false)).await;
        let actor = Actor::console();
        let group = engine.create_group(&actor, "builders").await.unwrap();
        engine
            .set_permission(&actor, group.holder().id(), Node::builder("build").build())
            .await
            .unwrap();
        assert!(engine.get_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn temporary_nodes_and_clearing() {
        let engine = engine(EngineConfiguration::default()).await;
        let actor = Actor::console();
        let id = Uuid::new_v4();
        let user = HolderId::User(id);
        engine.load_user(id, None).await.unwrap();

        let expiry = Timestamp::now() + 3600;
        let fly = Node::builder("fly").expiry(expiry).build();
        assert_eq!(
            engine
                .set_temporary_permission(
                    &actor,
                    &user,
                    fly.clone(),
                    TemporaryMergeBehaviour::Deny
                )
                .await
                .unwrap(),
            MutateResult::Success
        );
        let earlier = fly.to_builder().expiry(Timestamp::now() + 60).build();
        assert_eq!(
            engine
                .set_temporary_permission(
                    &actor,
                    &user,
                    earlier,
                    TemporaryMergeBehaviour::Replace
                )
                .await
                .unwrap(),
            MutateResult::AlreadyHas
        );
        assert_eq!(
            engine.check(&user, "fly", &QueryOptions::global()).unwrap(),
            Tristate::True
        );
        assert_eq!(
            engine.primary_group(id, &QueryOptions::global()).unwrap(),
            "default"
        );

        // Clearing keeps the default membership.
        assert_eq!(engine.clear_nodes(&actor, &user, None).await.unwrap(), 2);
        assert_eq!(
            engine.check(&user, "fly", &QueryOptions::global()).unwrap(),
            Tristate::Undefined
        );
        assert!(engine.user(id).unwrap().is_default("default"));
    }

    #[tokio::test]
    async fn housekeeping_removes_expired_nodes() {
        let engine = engine(EngineConfiguration::default()).await;
        let id = Uuid::new_v4();
        let user = engine.load_user(id, None).await.unwrap();
        let expired = Node::builder("fly").expiry(Timestamp::new(500)).build();
        user.set_permission(expired.clone());
        engine.save_user(id).await.unwrap();

        assert_eq!(engine.housekeeping().await.unwrap(), 1);
        assert!(!user.has_node(&expired, Equality::Exact));
        assert_eq!(engine.housekeeping().await.unwrap(), 0);

        // The removal was persisted.
        engine.cleanup_user(id);
        let user = engine.load_user(id, None).await.unwrap();
        assert!(!user.has_node(&expired, Equality::Exact));
    }

    #[tokio::test]
    async fn housekeeping_runs_in_interval() {
        let config = EngineConfiguration::new().housekeeping_interval(Duration::from_millis(10));
        let engine = engine(config).await;
        let group = engine
            .create_group(&Actor::console(), "guests")
            .await
            .unwrap();
        let expired = Node::builder("chat").expiry(Timestamp::new(500)).build();
        group.set_permission(expired.clone());

        tokio::select! {
            _ = engine.run_housekeeping() => {},
            _ = tokio::time::sleep(Duration::from_millis(50)) => {},
        }
        assert!(!group.has_node(&expired, Equality::Exact));
    }
}
