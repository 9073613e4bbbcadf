// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted shape of a node.
use std::fmt::Display;

use warden_core::context::{GLOBAL, SERVER_KEY, WORLD_KEY};
use warden_core::legacy::{parse_context, serialize_context};
use warden_core::{LegacyKeyError, Node, Timestamp};

/// Flat, fully serializable projection of a node as it is stored by every backend.
///
/// * `server` and `world` hold one value each, `global` if the node is not restricted.
/// * `expiry` is `0` for permanent nodes.
/// * `contexts` holds all remaining context pairs in the `(key=value,...)` form.
///
/// Records compare by all fields, sets of records iterate in a deterministic order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRecord {
    pub permission: String,
    pub value: bool,
    pub server: String,
    pub world: String,
    pub expiry: u64,
    pub contexts: String,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let context = node.context();
        let server = context.server();
        let world = context.world();

        let mut remaining = context.to_builder();
        if let Some(server) = server {
            remaining.remove(SERVER_KEY, server);
        }
        if let Some(world) = world {
            remaining.remove(WORLD_KEY, world);
        }

        Self {
            permission: node.key().to_string(),
            value: node.value(),
            server: server.unwrap_or(GLOBAL).to_string(),
            world: world.unwrap_or(GLOBAL).to_string(),
            expiry: node.expiry().map(u64::from).unwrap_or_default(),
            contexts: serialize_context(&remaining.build()),
        }
    }
}

impl TryFrom<&NodeRecord> for Node {
    type Error = LegacyKeyError;

    fn try_from(record: &NodeRecord) -> Result<Self, Self::Error> {
        if record.permission.trim().is_empty() {
            return Err(LegacyKeyError::EmptyPermission(record.permission.clone()));
        }

        let mut context = parse_context(&record.contexts)?.to_builder();
        context.add(SERVER_KEY, &record.server);
        context.add(WORLD_KEY, &record.world);

        let mut builder = Node::builder(&record.permission)
            .value(record.value)
            .context(&context.build());
        if record.expiry > 0 {
            builder = builder.expiry(Timestamp::new(record.expiry));
        }
        Ok(builder.build())
    }
}

impl Display for NodeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}={} server={} world={} expiry={} contexts={}",
            self.permission, self.value, self.server, self.world, self.expiry, self.contexts
        )
    }
}
