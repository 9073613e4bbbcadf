// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sets of key/value constraints describing where a node applies.
use std::collections::BTreeSet;
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Context key naming the server a node applies on.
pub const SERVER_KEY: &str = "server";

/// Context key naming the world a node applies in.
pub const WORLD_KEY: &str = "world";

/// Placeholder value for server or world meaning "no restriction".
pub const GLOBAL: &str = "global";

/// Immutable set of (key, value) context pairs.
///
/// A key can occur with more than one value. All keys and values are trimmed and lowercased on
/// insertion, a `global` server or world value is dropped as it equals the absence of that key.
///
/// The empty set is the "global" context: nodes carrying it apply everywhere. Entries are kept
/// in a sorted set, the type is hash-stable and can be used as a map key.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContextSet(BTreeSet<(String, String)>);

impl ContextSet {
    /// Returns the empty, global context set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a context set with exactly one pair.
    pub fn singleton(key: &str, value: &str) -> Self {
        ContextSetBuilder::new().with(key, value).build()
    }

    pub fn builder() -> ContextSetBuilder {
        ContextSetBuilder::new()
    }

    /// Returns a mutable copy of this set.
    pub fn to_builder(&self) -> ContextSetBuilder {
        ContextSetBuilder(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns true if the exact pair is part of this set.
    pub fn contains(&self, key: &str, value: &str) -> bool {
        let Some(pair) = normalize(key, value) else {
            return false;
        };
        self.0.contains(&pair)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let key = key.trim().to_lowercase();
        self.0.iter().any(|(k, _)| *k == key)
    }

    /// Returns all values stored under a key.
    pub fn values<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let key = key.trim().to_lowercase();
        self.0
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the first value stored under a key.
    pub fn any_value(&self, key: &str) -> Option<&str> {
        self.values(key).next()
    }

    /// Returns true if every pair of this set is also contained in `other`.
    ///
    /// The empty set is a subset of every set.
    pub fn is_subset_of(&self, other: &ContextSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Server this set is restricted to, if any.
    pub fn server(&self) -> Option<&str> {
        self.any_value(SERVER_KEY)
    }

    /// World this set is restricted to, if any.
    pub fn world(&self) -> Option<&str> {
        self.any_value(WORLD_KEY)
    }

    /// Returns a copy of this set without any pair using the given key.
    pub fn without(&self, key: &str) -> ContextSet {
        let mut builder = self.to_builder();
        builder.remove_all(key);
        builder.build()
    }

    /// Returns all pairs which are neither `server` nor `world` entries.
    pub fn extra(&self) -> ContextSet {
        ContextSet(
            self.0
                .iter()
                .filter(|(key, _)| key != SERVER_KEY && key != WORLD_KEY)
                .cloned()
                .collect(),
        )
    }

    /// Number of `server` and `world` restrictions, used to rank how specific a set is.
    pub fn specificity(&self) -> u8 {
        match (self.server().is_some(), self.world().is_some()) {
            (true, true) => 3,
            (true, false) => 2,
            (false, true) => 1,
            (false, false) => 0,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for ContextSet
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut builder = ContextSetBuilder::new();
        for (key, value) in iter {
            builder.add(key.as_ref(), value.as_ref());
        }
        builder.build()
    }
}

impl Display for ContextSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "{GLOBAL}");
        }
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "({})", pairs.join(", "))
    }
}

/// Mutable variant of a [`ContextSet`] used while building a lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextSetBuilder(BTreeSet<(String, String)>);

impl ContextSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair and returns the builder.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.add(key, value);
        self
    }

    /// Adds a pair, empty keys or values and `global` server or world values are ignored.
    pub fn add(&mut self, key: &str, value: &str) -> &mut Self {
        if let Some(pair) = normalize(key, value) {
            self.0.insert(pair);
        }
        self
    }

    pub fn add_all(&mut self, other: &ContextSet) -> &mut Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    pub fn remove(&mut self, key: &str, value: &str) -> &mut Self {
        if let Some(pair) = normalize(key, value) {
            self.0.remove(&pair);
        }
        self
    }

    /// Removes every pair using the given key.
    pub fn remove_all(&mut self, key: &str) -> &mut Self {
        let key = key.trim().to_lowercase();
        self.0.retain(|(k, _)| *k != key);
        self
    }

    pub fn build(&self) -> ContextSet {
        ContextSet(self.0.clone())
    }
}

fn normalize(key: &str, value: &str) -> Option<(String, String)> {
    let key = key.trim().to_lowercase();
    let value = value.trim().to_lowercase();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    if (key == SERVER_KEY || key == WORLD_KEY) && value == GLOBAL {
        return None;
    }
    Some((key, value))
}
