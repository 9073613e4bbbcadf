// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal write sets between persisted and desired node records.
use std::collections::BTreeSet;

use crate::record::NodeRecord;

/// Records to write so the persisted set of a holder equals the desired set.
///
/// Backends apply `to_delete` before `to_insert` within one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub to_insert: BTreeSet<NodeRecord>,
    pub to_delete: BTreeSet<NodeRecord>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_insert.len() + self.to_delete.len()
    }
}

/// Computes the difference between the persisted and the desired records under exact equality.
///
/// Applying the result and reconciling again yields no changes. After a partially applied result
/// the next reconciliation against the partial state yields exactly the remaining operations.
pub fn reconcile(persisted: &BTreeSet<NodeRecord>, desired: &BTreeSet<NodeRecord>) -> Changes {
    Changes {
        to_insert: desired.difference(persisted).cloned().collect(),
        to_delete: persisted.difference(desired).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use warden_core::{Node, Timestamp};

    use crate::record::NodeRecord;

    use super::reconcile;

    fn records(nodes: &[Node]) -> BTreeSet<NodeRecord> {
        nodes.iter().map(NodeRecord::from).collect()
    }

    fn apply(persisted: &BTreeSet<NodeRecord>, changes: &super::Changes) -> BTreeSet<NodeRecord> {
        persisted
            .difference(&changes.to_delete)
            .chain(changes.to_insert.iter())
            .cloned()
            .collect()
    }

    #[test]
    fn minimal_write_set() {
        let persisted = records(&[
            Node::builder("a").build(),
            Node::builder("b").build(),
            Node::builder("c").expiry(Timestamp::new(100)).build(),
        ]);
        let desired = records(&[
            Node::builder("a").build(),
            Node::builder("b").negated().build(),
            Node::builder("c").expiry(Timestamp::new(200)).build(),
            Node::builder("d").server("lobby").build(),
        ]);

        let changes = reconcile(&persisted, &desired);
        assert_eq!(
            changes.to_insert,
            records(&[
                Node::builder("b").negated().build(),
                Node::builder("c").expiry(Timestamp::new(200)).build(),
                Node::builder("d").server("lobby").build(),
            ])
        );
        assert_eq!(
            changes.to_delete,
            records(&[
                Node::builder("b").build(),
                Node::builder("c").expiry(Timestamp::new(100)).build(),
            ])
        );
        assert_eq!(changes.len(), 5);
    }

    #[test]
    fn idempotent() {
        let persisted = records(&[Node::builder("a").build(), Node::builder("b").build()]);
        let desired = records(&[Node::builder("b").build(), Node::inheritance("vip").build()]);

        let changes = reconcile(&persisted, &desired);
        let persisted = apply(&persisted, &changes);
        assert_eq!(persisted, desired);
        assert!(reconcile(&persisted, &desired).is_empty());
    }

    #[test]
    fn partial_apply_yields_residual() {
        let persisted = records(&[Node::builder("a").build(), Node::builder("b").build()]);
        let desired = records(&[Node::builder("c").build()]);
        let changes = reconcile(&persisted, &desired);

        // Deletes went through, inserts failed.
        let partial: BTreeSet<NodeRecord> = persisted
            .difference(&changes.to_delete)
            .cloned()
            .collect();
        let residual = reconcile(&partial, &desired);
        assert!(residual.to_delete.is_empty());
        assert_eq!(residual.to_insert, changes.to_insert);
    }
}
