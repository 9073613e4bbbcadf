// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use warden_auth::HolderId;
use warden_core::{LogEntry, UserId};

use crate::record::NodeRecord;
use crate::users::UserData;

#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryState {
    pub(crate) nodes: BTreeMap<HolderId, BTreeSet<NodeRecord>>,
    pub(crate) users: BTreeMap<UserId, UserData>,
    pub(crate) groups: BTreeSet<String>,
    pub(crate) tracks: BTreeMap<String, Vec<String>>,
    pub(crate) actions: Vec<LogEntry>,
    pub(crate) uuids: BTreeMap<String, UserId>,
}

/// In-memory store.
///
/// This does not persist data permamently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// Writes are visible immediately. Transactions are serialized like in the SQLite store and a
/// rollback restores the state from when the transaction began.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    snapshot: Arc<Mutex<Option<MemoryState>>>,
    semaphore: Arc<Semaphore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            snapshot: Arc::default(),
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state
            .read()
            .expect("acquire shared read access on memory store")
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state
            .write()
            .expect("acquire exclusive write access on memory store")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::traits::Transaction for MemoryStore {
    type Error = Infallible;

    type Permit = MemoryPermit;

    async fn begin(&self) -> Result<MemoryPermit, Infallible> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("if semaphore is closed then the whole struct is gone as well");

        let snapshot = self.read().clone();
        self.snapshot
            .lock()
            .expect("acquire snapshot of memory store")
            .replace(snapshot);

        Ok(MemoryPermit { _permit: permit })
    }

    async fn rollback(&self, permit: MemoryPermit) -> Result<(), Infallible> {
        let snapshot = self
            .snapshot
            .lock()
            .expect("acquire snapshot of memory store")
            .take();
        if let Some(snapshot) = snapshot {
            *self.write() = snapshot;
        }
        drop(permit);
        Ok(())
    }

    async fn commit(&self, permit: MemoryPermit) -> Result<(), Infallible> {
        self.snapshot
            .lock()
            .expect("acquire snapshot of memory store")
            .take();
        drop(permit);
        Ok(())
    }
}

/// Exclusive access to the memory store, released when dropped.
pub struct MemoryPermit {
    _permit: OwnedSemaphorePermit,
}

// Store trait implementations are in the regarding modules, see for example `nodes` or `users`.
