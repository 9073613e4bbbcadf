// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::convert::Infallible;

use warden_auth::HolderId;
use warden_core::UserId;

use crate::memory::MemoryStore;
use crate::nodes::NodeStore;
use crate::reconcile::Changes;
use crate::record::NodeRecord;

impl NodeStore for MemoryStore {
    type Error = Infallible;

    async fn node_records(&self, holder: &HolderId) -> Result<BTreeSet<NodeRecord>, Self::Error> {
        Ok(self.read().nodes.get(holder).cloned().unwrap_or_default())
    }

    async fn apply_changes(&self, holder: &HolderId, changes: &Changes) -> Result<(), Self::Error> {
        let mut state = self.write();
        let records = state.nodes.entry(holder.clone()).or_default();
        for record in &changes.to_delete {
            records.remove(record);
        }
        records.extend(changes.to_insert.iter().cloned());
        if records.is_empty() {
            state.nodes.remove(holder);
        }
        Ok(())
    }

    async fn delete_nodes(&self, holder: &HolderId) -> Result<usize, Self::Error> {
        let removed = self.write().nodes.remove(holder);
        Ok(removed.map(|records| records.len()).unwrap_or_default())
    }

    async fn user_holders(&self) -> Result<BTreeSet<UserId>, Self::Error> {
        Ok(self
            .read()
            .nodes
            .keys()
            .filter_map(|holder| match holder {
                HolderId::User(id) => Some(*id),
                HolderId::Group(_) => None,
            })
            .collect())
    }
}
