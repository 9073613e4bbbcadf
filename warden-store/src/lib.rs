// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence of permission holders, tracks, the action log and the username cache.
//!
//! Store backends implement one trait per domain ([`NodeStore`], [`UserStore`], [`GroupStore`],
//! [`TrackStore`], [`ActionLogStore`] and [`UuidCacheStore`]) together with a [`Transaction`]
//! provider. The [`Storage`] facade loads holders into a [`Registry`](warden_auth::Registry) and
//! saves them back by writing only the difference between the persisted and the in-memory nodes,
//! see [`reconcile`].
//!
//! Two backends are included: [`MemoryStore`] behind the `memory` feature and [`SqliteStore`]
//! behind the `sqlite` feature.
pub mod actions;
pub mod groups;
#[cfg(feature = "memory")]
mod memory;
pub mod nodes;
mod reconcile;
mod record;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod storage;
#[cfg(any(test, feature = "test_utils"))]
mod test_utils;
pub mod tracks;
mod traits;
pub mod users;
pub mod uuids;

pub use actions::ActionLogStore;
pub use groups::GroupStore;
#[cfg(feature = "memory")]
pub use memory::{MemoryPermit, MemoryStore};
pub use nodes::NodeStore;
pub use reconcile::{Changes, reconcile};
pub use record::NodeRecord;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
pub use storage::{Storage, StorageError};
pub use tracks::TrackStore;
pub use traits::{Store, Transaction};
pub use users::{UserData, UserStore};
pub use uuids::{MappingResult, UuidCacheStore};
