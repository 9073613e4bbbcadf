// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission holders and the resolution of their nodes.
//!
//! Users and groups own enduring and transient nodes. A [`Registry`] keeps them loaded and answers
//! permission checks and meta lookups by walking the inheritance graph, caching the results per
//! holder and query until a mutation invalidates them.
//!
//! ```
//! use uuid::Uuid;
//! use warden_auth::Registry;
//! use warden_core::{Node, QueryOptions, Tristate};
//!
//! let registry = Registry::default();
//! registry
//!     .ensure_default_group()
//!     .set_permission(Node::builder("chat.basic").build());
//!
//! let user = registry.load_user(Uuid::new_v4());
//! user.give_default_if_needed("default");
//!
//! let global = QueryOptions::global();
//! assert_eq!(registry.check(&user, "chat.basic", &global), Tristate::True);
//! assert_eq!(registry.check(&user, "chat.admin", &global), Tristate::Undefined);
//! ```
mod buffer;
mod cache;
mod calculator;
mod config;
pub mod graph;
mod group;
mod holder;
pub mod meta;
mod ordering;
mod primary_group;
pub mod promotion;
mod registry;
pub mod resolver;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod user;

pub use buffer::DebounceBuffer;
pub use cache::{CacheKind, ResolvedDataCache};
pub use calculator::PermissionData;
pub use config::{DEFAULT_GROUP, DEFAULT_REFRESH_DEBOUNCE, ResolverConfiguration};
pub use group::{Group, GroupLookup};
pub use holder::{HolderId, NodeMap, PermissionHolder, TemporaryMergeBehaviour};
pub use meta::{MetaAccumulator, MetaData};
pub use ordering::compare_priority;
pub use primary_group::PrimaryGroupCalculation;
pub use promotion::{PromotionError, PromotionOutcome};
pub use registry::{LoadedTrack, Registry};
pub use resolver::{InheritanceResolver, LocalizedNode};
pub use user::{MAX_USERNAME_LENGTH, User};
