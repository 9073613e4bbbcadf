// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter for the flat, single-string serialization of nodes used by older storage formats.
//!
//! ```text
//! [server[-world]/][(key=value,key=value)]permission[$expiry]
//! ```
//!
//! A world without a server is written with the `global` server placeholder. Delimiters inside
//! server, world, context pairs and the permission itself are escaped with a backslash. The value
//! of the node is not part of the string and is stored next to it.
use thiserror::Error;

use crate::context::{ContextSet, ContextSetBuilder, GLOBAL, SERVER_KEY, WORLD_KEY};
use crate::node::Node;
use crate::timestamp::Timestamp;

const DELIMITERS: [char; 8] = ['\\', '/', '-', '$', '(', ')', '=', ','];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LegacyKeyError {
    #[error("context section is not closed in '{0}'")]
    UnclosedContext(String),

    #[error("invalid context pair '{0}'")]
    InvalidContext(String),

    #[error("invalid expiry '{0}'")]
    InvalidExpiry(String),

    #[error("no permission given in '{0}'")]
    EmptyPermission(String),
}

impl Node {
    /// Serializes the key, context and expiry of this node into a single legacy string.
    pub fn to_legacy_key(&self) -> String {
        let mut result = String::new();

        let server = self.server();
        let world = self.world();
        if server.is_some() || world.is_some() {
            result.push_str(&escape(server.unwrap_or(GLOBAL)));
            if let Some(world) = world {
                result.push('-');
                result.push_str(&escape(world));
            }
            result.push('/');
        }

        let extra = self.context().extra();
        if !extra.is_empty() {
            result.push_str(&serialize_context(&extra));
        }

        result.push_str(&escape(self.key()));

        if let Some(expiry) = self.expiry() {
            result.push('$');
            result.push_str(&expiry.to_string());
        }

        result
    }

    /// Parses a legacy string back into a node with the given value.
    pub fn from_legacy_key(serialized: &str, value: bool) -> Result<Node, LegacyKeyError> {
        let mut context = ContextSetBuilder::new();
        let mut rest = serialized.trim();

        if let Some(index) = find_unescaped(rest, '/') {
            let location = &rest[..index];
            match find_unescaped(location, '-') {
                Some(dash) => {
                    context.add(SERVER_KEY, &unescape(&location[..dash]));
                    context.add(WORLD_KEY, &unescape(&location[dash + 1..]));
                }
                None => {
                    context.add(SERVER_KEY, &unescape(location));
                }
            }
            rest = &rest[index + 1..];
        }

        if rest.starts_with('(') {
            let Some(end) = find_unescaped(rest, ')') else {
                return Err(LegacyKeyError::UnclosedContext(serialized.to_string()));
            };
            context.add_all(&parse_context(&rest[..=end])?);
            rest = &rest[end + 1..];
        }

        let mut expiry = None;
        if let Some(index) = rfind_unescaped(rest, '$') {
            let raw = &rest[index + 1..];
            let seconds = raw
                .parse::<u64>()
                .map_err(|_| LegacyKeyError::InvalidExpiry(raw.to_string()))?;
            expiry = Some(Timestamp::new(seconds));
            rest = &rest[..index];
        }

        let permission = unescape(rest);
        if permission.trim().is_empty() {
            return Err(LegacyKeyError::EmptyPermission(serialized.to_string()));
        }

        let mut builder = Node::builder(&permission)
            .value(value)
            .context(&context.build());
        if let Some(expiry) = expiry {
            builder = builder.expiry(expiry);
        }
        Ok(builder.build())
    }
}

/// Serializes a context set into the `(key=value,key=value)` form, `()` for the empty set.
pub fn serialize_context(context: &ContextSet) -> String {
    let pairs: Vec<String> = context
        .iter()
        .map(|(key, value)| format!("{}={}", escape(key), escape(value)))
        .collect();
    format!("({})", pairs.join(","))
}

/// Parses a context set from the `(key=value,key=value)` form.
pub fn parse_context(serialized: &str) -> Result<ContextSet, LegacyKeyError> {
    let inner = serialized
        .trim()
        .strip_prefix('(')
        .and_then(|value| value.strip_suffix(')'))
        .ok_or_else(|| LegacyKeyError::UnclosedContext(serialized.to_string()))?;

    let mut context = ContextSetBuilder::new();
    if inner.is_empty() {
        return Ok(context.build());
    }

    for pair in split_unescaped(inner, ',') {
        let Some(index) = find_unescaped(pair, '=') else {
            return Err(LegacyKeyError::InvalidContext(pair.to_string()));
        };
        let key = unescape(&pair[..index]);
        let value = unescape(&pair[index + 1..]);
        if key.trim().is_empty() || value.trim().is_empty() {
            return Err(LegacyKeyError::InvalidContext(pair.to_string()));
        }
        context.add(&key, &value);
    }

    Ok(context.build())
}

fn escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        if DELIMITERS.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

fn unescape(value: &str) -> String {
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

/// Byte positions of all unescaped occurences of `target`.
fn unescaped_positions(value: &str, target: char) -> impl Iterator<Item = usize> + '_ {
    let mut escaped = false;
    value.char_indices().filter_map(move |(index, c)| {
        if escaped {
            escaped = false;
            return None;
        }
        if c == '\\' {
            escaped = true;
            return None;
        }
        (c == target).then_some(index)
    })
}

fn find_unescaped(value: &str, target: char) -> Option<usize> {
    unescaped_positions(value, target).next()
}

fn rfind_unescaped(value: &str, target: char) -> Option<usize> {
    unescaped_positions(value, target).last()
}

fn split_unescaped(value: &str, target: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for index in unescaped_positions(value, target) {
        parts.push(&value[start..index]);
        start = index + target.len_utf8();
    }
    parts.push(&value[start..]);
    parts
}
