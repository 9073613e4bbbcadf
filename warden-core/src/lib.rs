// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types of the warden permission engine.
//!
//! Permission "nodes" are immutable assertions (a permission, a group membership, a piece of meta
//! data, a chat prefix or suffix) which apply under a set of contexts and can expire. Holders of
//! these nodes and the algorithms resolving them live in `warden-auth`, persistence in
//! `warden-store`.
pub mod context;
pub mod legacy;
pub mod log;
mod mutate;
pub mod node;
pub mod query;
mod timestamp;
pub mod track;
mod tristate;

pub use context::{ContextSet, ContextSetBuilder};
pub use legacy::LegacyKeyError;
pub use log::{Log, LogEntry, LogEntryBuilder, LogError, TargetType};
pub use mutate::MutateResult;
pub use node::{Equality, Node, NodeBuilder, NodeKind};
pub use query::{QueryOptions, QueryOptionsBuilder};
pub use timestamp::Timestamp;
pub use track::{Track, TrackError};
pub use tristate::Tristate;

/// Identifier of a user.
pub type UserId = uuid::Uuid;
