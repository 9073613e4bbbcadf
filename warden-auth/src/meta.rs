// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accumulation of meta data, prefixes and suffixes over resolved nodes.
use std::cmp::Reverse;
use std::collections::BTreeMap;

use warden_core::NodeKind;

use crate::resolver::LocalizedNode;

/// Meta key holding the weight of the heaviest group a holder inherits from.
pub const WEIGHT_META_KEY: &str = "weight";

/// Meta key overriding the primary group of a user.
pub const PRIMARY_GROUP_META_KEY: &str = "primarygroup";

/// Collects meta data while walking resolved nodes from highest to lowest priority.
///
/// * For meta keys all values are kept in the order they were seen, the first one is the
///   effective value.
/// * For prefixes and suffixes one value per priority is kept, the first one seen for a priority
///   wins. The effective prefix or suffix is the one with the highest priority.
/// * The weight is the highest weight of all accumulated weight nodes.
#[derive(Clone, Debug, Default)]
pub struct MetaAccumulator {
    meta: BTreeMap<String, Vec<String>>,
    prefixes: BTreeMap<Reverse<i32>, String>,
    suffixes: BTreeMap<Reverse<i32>, String>,
    weight: Option<u32>,
}

impl MetaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates all meta, prefix, suffix and weight nodes of a resolved list.
    pub fn accumulate_all<'a>(&mut self, nodes: impl IntoIterator<Item = &'a LocalizedNode>) {
        for node in nodes {
            self.accumulate(node);
        }
    }

    /// Accumulates one node, nodes with a `false` value and all other kinds are ignored.
    pub fn accumulate(&mut self, localized: &LocalizedNode) {
        let node = localized.node();
        if !node.value() {
            return;
        }
        match node.kind() {
            NodeKind::Meta(key, value) => {
                self.meta.entry(key.clone()).or_default().push(value.clone());
            }
            NodeKind::Prefix(priority, value) => {
                self.prefixes
                    .entry(Reverse(*priority))
                    .or_insert_with(|| value.clone());
            }
            NodeKind::Suffix(priority, value) => {
                self.suffixes
                    .entry(Reverse(*priority))
                    .or_insert_with(|| value.clone());
            }
            NodeKind::Weight(weight) => self.accumulate_weight(*weight),
            NodeKind::Permission | NodeKind::Inheritance(_) => (),
        }
    }

    pub fn accumulate_weight(&mut self, weight: u32) {
        self.weight = Some(self.weight.map_or(weight, |current| current.max(weight)));
    }

    /// Finishes accumulation.
    ///
    /// The weight, if any, is exposed under the `weight` meta key unless a meta node set that key
    /// already.
    pub fn complete(mut self) -> MetaData {
        if let Some(weight) = self.weight {
            self.meta
                .entry(WEIGHT_META_KEY.to_string())
                .or_insert_with(|| vec![weight.to_string()]);
        }
        MetaData {
            meta: self.meta,
            prefixes: self.prefixes,
            suffixes: self.suffixes,
            weight: self.weight,
            primary_group: None,
        }
    }
}

/// Effective meta data of a holder for one query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaData {
    meta: BTreeMap<String, Vec<String>>,
    prefixes: BTreeMap<Reverse<i32>, String>,
    suffixes: BTreeMap<Reverse<i32>, String>,
    weight: Option<u32>,
    primary_group: Option<String>,
}

impl MetaData {
    /// Effective value of a meta key.
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .get(&key.trim().to_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a meta key from highest to lowest priority.
    pub fn meta_values(&self, key: &str) -> &[String] {
        self.meta
            .get(&key.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Effective value of every meta key.
    pub fn meta(&self) -> BTreeMap<&str, &str> {
        self.meta
            .iter()
            .filter_map(|(key, values)| Some((key.as_str(), values.first()?.as_str())))
            .collect()
    }

    /// Prefix with the highest priority.
    pub fn prefix(&self) -> Option<(i32, &str)> {
        first_entry(&self.prefixes)
    }

    /// Suffix with the highest priority.
    pub fn suffix(&self) -> Option<(i32, &str)> {
        first_entry(&self.suffixes)
    }

    /// All prefixes from highest to lowest priority.
    pub fn prefixes(&self) -> impl Iterator<Item = (i32, &str)> {
        self.prefixes
            .iter()
            .map(|(priority, value)| (priority.0, value.as_str()))
    }

    /// All suffixes from highest to lowest priority.
    pub fn suffixes(&self) -> impl Iterator<Item = (i32, &str)> {
        self.suffixes
            .iter()
            .map(|(priority, value)| (priority.0, value.as_str()))
    }

    pub fn weight(&self) -> Option<u32> {
        self.weight
    }

    /// Primary group of a user, `None` for groups.
    pub fn primary_group(&self) -> Option<&str> {
        self.primary_group.as_deref()
    }

    pub(crate) fn with_primary_group(mut self, group: String) -> Self {
        self.primary_group = Some(group);
        self
    }
}

fn first_entry(map: &BTreeMap<Reverse<i32>, String>) -> Option<(i32, &str)> {
    map.iter()
        .next()
        .map(|(priority, value)| (priority.0, value.as_str()))
}

#[cfg(test)]
mod tests {
    use warden_core::Node;

    use crate::holder::HolderId;
    use crate::resolver::LocalizedNode;

    use super::MetaAccumulator;

    fn localized(node: Node) -> LocalizedNode {
        LocalizedNode::new(node, HolderId::group("test"))
    }

    #[test]
    fn highest_prefix_priority_wins() {
        let mut accumulator = MetaAccumulator::new();
        accumulator.accumulate(&localized(Node::prefix(10, "Admin").build()));
        accumulator.accumulate(&localized(Node::prefix(20, "Owner").build()));
        let meta = accumulator.complete();

        assert_eq!(meta.prefix(), Some((20, "Owner")));
        assert_eq!(
            meta.prefixes().collect::<Vec<_>>(),
            vec![(20, "Owner"), (10, "Admin")]
        );
        assert_eq!(meta.suffix(), None);
    }

    #[test]
    fn first_seen_wins_on_equal_priority() {
        let mut accumulator = MetaAccumulator::new();
        accumulator.accumulate_all(&[
            localized(Node::suffix(5, "first").build()),
            localized(Node::suffix(5, "second").build()),
        ]);
        assert_eq!(accumulator.complete().suffix(), Some((5, "first")));
    }

    #[test]
    fn first_meta_value_wins() {
        let mut accumulator = MetaAccumulator::new();
        accumulator.accumulate_all(&[
            localized(Node::meta("color", "red").build()),
            localized(Node::meta("Color", "blue").build()),
            localized(Node::meta("size", "large").negated().build()),
        ]);
        let meta = accumulator.complete();

        assert_eq!(meta.meta_value("COLOR"), Some("red"));
        assert_eq!(meta.meta_values("color"), ["red", "blue"]);
        assert_eq!(meta.meta_value("size"), None);
        assert!(meta.meta_values("size").is_empty());
    }

    #[test]
    fn weight_is_maximum() {
        let mut accumulator = MetaAccumulator::new();
        accumulator.accumulate_all(&[
            localized(Node::weight(10).build()),
            localized(Node::weight(50).build()),
            localized(Node::builder("some.permission").build()),
        ]);
        accumulator.accumulate_weight(20);
        let meta = accumulator.complete();

        assert_eq!(meta.weight(), Some(50));
        assert_eq!(meta.meta_value("weight"), Some("50"));
        assert_eq!(meta.meta().len(), 1);
    }
}
