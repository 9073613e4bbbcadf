// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission nodes and their classification.
//!
//! A node is an immutable assertion held by a user or group. Its key is a dotted string, some
//! prefixes of it carry a special meaning:
//!
//! ```text
//! group.<name>              inheritance from another group
//! meta.<key>.<value>        arbitrary meta data
//! prefix.<priority>.<value> chat prefix
//! suffix.<priority>.<value> chat suffix
//! weight.<n>                weight of a group
//! ```
//!
//! Every other key is a plain permission. The classification is parsed once when the node is
//! built and kept as a typed [`NodeKind`] next to the key.
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::{ContextSet, ContextSetBuilder, SERVER_KEY, WORLD_KEY};
use crate::timestamp::Timestamp;

const GROUP_PREFIX: &str = "group.";
const META_PREFIX: &str = "meta.";
const PREFIX_PREFIX: &str = "prefix.";
const SUFFIX_PREFIX: &str = "suffix.";
const WEIGHT_PREFIX: &str = "weight.";

/// Typed classification of a node key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeKind {
    /// Plain (possibly wildcard) permission.
    Permission,

    /// Membership of the named group.
    Inheritance(String),

    /// Meta data entry with key and value.
    Meta(String, String),

    /// Chat prefix with priority and value.
    Prefix(i32, String),

    /// Chat suffix with priority and value.
    Suffix(i32, String),

    /// Weight of a group, used to order parents.
    Weight(u32),
}

impl NodeKind {
    /// Classifies a raw node key and returns the canonical key together with its kind.
    ///
    /// Keys of malformed special nodes (for example `prefix.abc.value`) are plain permissions.
    fn parse(raw: &str) -> (String, NodeKind) {
        let raw = raw.trim();

        if let Some(name) = strip_prefix_ignore_case(raw, GROUP_PREFIX)
            && !name.is_empty()
        {
            return NodeKind::Inheritance(name.to_lowercase()).canonical();
        }

        if let Some(rest) = strip_prefix_ignore_case(raw, META_PREFIX)
            && let Some(index) = find_unescaped_dot(rest)
        {
            let key = unescape_dots(&rest[..index]).to_lowercase();
            let value = unescape_dots(&rest[index + 1..]);
            if !key.is_empty() {
                return NodeKind::Meta(key, value).canonical();
            }
        }

        if let Some(rest) = strip_prefix_ignore_case(raw, PREFIX_PREFIX)
            && let Some((priority, value)) = parse_chat_meta(rest)
        {
            return NodeKind::Prefix(priority, value).canonical();
        }

        if let Some(rest) = strip_prefix_ignore_case(raw, SUFFIX_PREFIX)
            && let Some((priority, value)) = parse_chat_meta(rest)
        {
            return NodeKind::Suffix(priority, value).canonical();
        }

        if let Some(rest) = strip_prefix_ignore_case(raw, WEIGHT_PREFIX)
            && let Ok(weight) = rest.parse::<u32>()
        {
            return NodeKind::Weight(weight).canonical();
        }

        (raw.to_lowercase(), NodeKind::Permission)
    }

    fn canonical(self) -> (String, NodeKind) {
        let key = match &self {
            NodeKind::Permission => unreachable!("permissions have no canonical form"),
            NodeKind::Inheritance(name) => format!("{GROUP_PREFIX}{name}"),
            NodeKind::Meta(key, value) => {
                format!("{META_PREFIX}{}.{}", escape_dots(key), escape_dots(value))
            }
            NodeKind::Prefix(priority, value) => format!("{PREFIX_PREFIX}{priority}.{value}"),
            NodeKind::Suffix(priority, value) => format!("{SUFFIX_PREFIX}{priority}.{value}"),
            NodeKind::Weight(weight) => format!("{WEIGHT_PREFIX}{weight}"),
        };
        (key, self)
    }
}

/// Equality predicates to compare nodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Equality {
    /// All fields are equal.
    Exact,

    /// Key, context and expiry are equal, the value is ignored.
    IgnoreValue,

    /// Key, value, context and "is temporary" are equal, the exact expiry time is ignored.
    IgnoreExpiryTime,

    /// Key, context and "is temporary" are equal.
    IgnoreExpiryTimeAndValue,

    /// Key and context are equal.
    IgnoreValueOrIfTemporary,
}

/// Immutable permission, meta, inheritance, prefix or suffix assertion.
///
/// Nodes compare, hash and order by all their fields (`Equality::Exact`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    key: String,
    value: bool,
    context: ContextSet,
    expiry: Option<Timestamp>,
    kind: NodeKind,
}

impl Node {
    /// Returns a builder for a node with the given raw key, its kind is derived from the key.
    pub fn builder(key: &str) -> NodeBuilder {
        let (key, kind) = NodeKind::parse(key);
        NodeBuilder::from_parts(key, kind)
    }

    /// Returns a builder for a plain permission node.
    pub fn permission(key: &str) -> NodeBuilder {
        Self::builder(key)
    }

    /// Returns a builder for a node making the holder inherit from `group`.
    pub fn inheritance(group: &str) -> NodeBuilder {
        let (key, kind) = NodeKind::Inheritance(group.trim().to_lowercase()).canonical();
        NodeBuilder::from_parts(key, kind)
    }

    /// Returns a builder for a meta data node.
    pub fn meta(key: &str, value: &str) -> NodeBuilder {
        let (key, kind) = NodeKind::Meta(key.trim().to_lowercase(), value.to_string()).canonical();
        NodeBuilder::from_parts(key, kind)
    }

    /// Returns a builder for a chat prefix node.
    pub fn prefix(priority: i32, value: &str) -> NodeBuilder {
        let (key, kind) = NodeKind::Prefix(priority, value.to_string()).canonical();
        NodeBuilder::from_parts(key, kind)
    }

    /// Returns a builder for a chat suffix node.
    pub fn suffix(priority: i32, value: &str) -> NodeBuilder {
        let (key, kind) = NodeKind::Suffix(priority, value.to_string()).canonical();
        NodeBuilder::from_parts(key, kind)
    }

    /// Returns a builder for a weight node.
    pub fn weight(weight: u32) -> NodeBuilder {
        let (key, kind) = NodeKind::Weight(weight).canonical();
        NodeBuilder::from_parts(key, kind)
    }

    /// Canonical key of this node, for example `some.permission` or `group.admin`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn context(&self) -> &ContextSet {
        &self.context
    }

    pub fn expiry(&self) -> Option<Timestamp> {
        self.expiry
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn server(&self) -> Option<&str> {
        self.context.server()
    }

    pub fn world(&self) -> Option<&str> {
        self.context.world()
    }

    pub fn is_group_node(&self) -> bool {
        matches!(self.kind, NodeKind::Inheritance(_))
    }

    /// Name of the group this node inherits from.
    pub fn group_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Inheritance(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.kind, NodeKind::Meta(_, _))
    }

    pub fn meta_entry(&self) -> Option<(&str, &str)> {
        match &self.kind {
            NodeKind::Meta(key, value) => Some((key, value)),
            _ => None,
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self.kind, NodeKind::Prefix(_, _))
    }

    pub fn prefix_entry(&self) -> Option<(i32, &str)> {
        match &self.kind {
            NodeKind::Prefix(priority, value) => Some((*priority, value)),
            _ => None,
        }
    }

    pub fn is_suffix(&self) -> bool {
        matches!(self.kind, NodeKind::Suffix(_, _))
    }

    pub fn suffix_entry(&self) -> Option<(i32, &str)> {
        match &self.kind {
            NodeKind::Suffix(priority, value) => Some((*priority, value)),
            _ => None,
        }
    }

    /// Priority embedded in prefix and suffix nodes.
    pub fn chat_priority(&self) -> Option<i32> {
        match &self.kind {
            NodeKind::Prefix(priority, _) | NodeKind::Suffix(priority, _) => Some(*priority),
            _ => None,
        }
    }

    pub fn weight_value(&self) -> Option<u32> {
        match &self.kind {
            NodeKind::Weight(weight) => Some(*weight),
            _ => None,
        }
    }

    /// Returns the number of segments before a trailing `*`.
    ///
    /// `*` has level 0, `a.*` level 1 and `a.b.*` level 2. Keys which are not wildcards return
    /// `None`.
    pub fn wildcard_level(&self) -> Option<usize> {
        if !matches!(self.kind, NodeKind::Permission) {
            return None;
        }
        if self.key == "*" {
            return Some(0);
        }
        if self.key.ends_with(".*") {
            return Some(self.key.matches('.').count());
        }
        None
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard_level().is_some()
    }

    pub fn is_temporary(&self) -> bool {
        self.expiry.is_some()
    }

    pub fn is_permanent(&self) -> bool {
        self.expiry.is_none()
    }

    /// Returns true if this is a temporary node whose expiry lies at or before `now`.
    pub fn has_expired_at(&self, now: Timestamp) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now,
            None => false,
        }
    }

    /// Returns true if this is a temporary node which expired according to the system clock.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Timestamp::now())
    }

    /// Seconds left until this node expires, `None` for permanent nodes.
    pub fn seconds_until_expiry(&self, now: Timestamp) -> Option<u64> {
        self.expiry.map(|expiry| expiry.seconds_from(now))
    }

    /// Compares this node with another one using the given predicate.
    pub fn equals(&self, other: &Node, equality: Equality) -> bool {
        if self.key != other.key || self.context != other.context {
            return false;
        }
        match equality {
            Equality::Exact => self.value == other.value && self.expiry == other.expiry,
            Equality::IgnoreValue => self.expiry == other.expiry,
            Equality::IgnoreExpiryTime => {
                self.value == other.value && self.is_temporary() == other.is_temporary()
            }
            Equality::IgnoreExpiryTimeAndValue => self.is_temporary() == other.is_temporary(),
            Equality::IgnoreValueOrIfTemporary => true,
        }
    }

    /// Returns a builder pre-filled with all fields of this node.
    pub fn to_builder(&self) -> NodeBuilder {
        NodeBuilder {
            key: self.key.clone(),
            kind: self.kind.clone(),
            value: self.value,
            context: self.context.to_builder(),
            expiry: self.expiry,
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)?;
        if !self.context.is_empty() {
            write!(f, " {}", self.context)?;
        }
        if let Some(expiry) = self.expiry {
            write!(f, " (expires {expiry})")?;
        }
        Ok(())
    }
}

/// Builder for [`Node`].
#[derive(Clone, Debug)]
pub struct NodeBuilder {
    key: String,
    kind: NodeKind,
    value: bool,
    context: ContextSetBuilder,
    expiry: Option<Timestamp>,
}

impl NodeBuilder {
    fn from_parts(key: String, kind: NodeKind) -> Self {
        Self {
            key,
            kind,
            value: true,
            context: ContextSetBuilder::new(),
            expiry: None,
        }
    }

    /// Sets the value of the node. Default: `true`.
    pub fn value(mut self, value: bool) -> Self {
        self.value = value;
        self
    }

    /// Shorthand for `value(false)`.
    pub fn negated(self) -> Self {
        self.value(false)
    }

    /// Adds all pairs of the given context set.
    pub fn context(mut self, context: &ContextSet) -> Self {
        self.context.add_all(context);
        self
    }

    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.add(key, value);
        self
    }

    /// Restricts the node to a server, replacing earlier server restrictions.
    pub fn server(mut self, server: &str) -> Self {
        self.context.remove_all(SERVER_KEY).add(SERVER_KEY, server);
        self
    }

    /// Restricts the node to a world, replacing earlier world restrictions.
    pub fn world(mut self, world: &str) -> Self {
        self.context.remove_all(WORLD_KEY).add(WORLD_KEY, world);
        self
    }

    /// Makes the node temporary, expiring at the given time.
    pub fn expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Makes the node permanent again.
    pub fn clear_expiry(mut self) -> Self {
        self.expiry = None;
        self
    }

    pub fn build(self) -> Node {
        Node {
            key: self.key,
            value: self.value,
            context: self.context.build(),
            expiry: self.expiry,
            kind: self.kind,
        }
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

fn parse_chat_meta(rest: &str) -> Option<(i32, String)> {
    let (priority, value) = rest.split_once('.')?;
    let priority = priority.parse::<i32>().ok()?;
    Some((priority, value.to_string()))
}

fn escape_dots(value: &str) -> String {
    value.replace('\\', "\\\\").replace('.', "\\.")
}

fn unescape_dots(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn find_unescaped_dot(value: &str) -> Option<usize> {
    let mut escaped = false;
    for (index, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '.' => return Some(index),
            _ => (),
        }
    }
    None
}
