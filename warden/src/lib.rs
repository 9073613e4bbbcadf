// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission engine for users and inheritable groups.
//!
//! Holders own permission, inheritance and meta nodes which apply under sets of contexts and can
//! expire. The [`Engine`] keeps them loaded, answers permission checks and meta lookups through
//! the resolver of `warden-auth` and persists every mutation through a `warden-store` backend.
//!
//! ```no_run
//! # async fn run() -> Result<(), warden::EngineError> {
//! use warden::{Actor, HolderId};
//! use warden_core::{Node, QueryOptions, Tristate};
//!
//! let engine = warden::builder()
//!     .database_url("sqlite://permissions.db")
//!     .build()
//!     .await?;
//!
//! let admin = engine.create_group(&Actor::console(), "admin").await?;
//! engine
//!     .set_permission(&Actor::console(), admin.holder().id(), Node::builder("*").build())
//!     .await?;
//!
//! let user = engine.load_user(uuid::Uuid::new_v4(), Some("alice")).await?;
//! let id = HolderId::User(user.id());
//! assert_eq!(
//!     engine.check(&id, "build.place", &QueryOptions::global())?,
//!     Tristate::Undefined
//! );
//! # Ok(())
//! # }
//! ```
mod builder;
mod config;
mod engine;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use builder::EngineBuilder;
pub use config::{DEFAULT_HOUSEKEEPING_INTERVAL, EngineConfiguration};
pub use engine::{Actor, Engine, EngineError};
pub use warden_auth::{HolderId, PromotionOutcome, TemporaryMergeBehaviour};

/// Builder for an [`Engine`] backed by SQLite.
pub fn builder() -> EngineBuilder {
    EngineBuilder::new()
}
