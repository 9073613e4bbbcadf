// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use warden_auth::ResolverConfiguration;
use warden_store::{SqliteStore, SqliteStoreBuilder};

use crate::config::EngineConfiguration;
use crate::engine::{Engine, EngineError};

/// Builds an [`Engine`] backed by an SQLite database.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfiguration,
    store: SqliteStoreBuilder,
}

impl EngineBuilder {
    pub(crate) fn new() -> Self {
        EngineBuilder {
            config: EngineConfiguration::default(),
            store: SqliteStoreBuilder::default(),
        }
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.store = self.store.database_url(url);
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.store = self.store.max_connections(max_connections);
        self
    }

    pub fn default_migrations(mut self, value: bool) -> Self {
        self.store = self.store.run_default_migrations(value);
        self
    }

    pub fn config(mut self, config: EngineConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, config: ResolverConfiguration) -> Self {
        self.config.resolver = config;
        self
    }

    pub fn housekeeping_interval(mut self, interval: Duration) -> Self {
        self.config.housekeeping_interval = interval;
        self
    }

    pub fn log_actions(mut self, value: bool) -> Self {
        self.config.log_actions = value;
        self
    }

    /// Opens the database and loads all stored groups and tracks.
    pub async fn build(self) -> Result<Engine<SqliteStore>, EngineError> {
        let store = self.store.build().await?;
        let engine = Engine::new(store, self.config);
        engine.load_all().await?;
        Ok(engine)
    }
}
