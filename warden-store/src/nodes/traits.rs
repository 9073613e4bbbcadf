// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::error::Error;

use warden_auth::HolderId;
use warden_core::UserId;

use crate::reconcile::Changes;
use crate::record::NodeRecord;

/// Interface for storing the enduring nodes of users and groups.
///
/// Nodes are kept as flat [`NodeRecord`]s per holder. Writes are expressed as the minimal
/// [`Changes`] computed by [`reconcile`](crate::reconcile) so rows which did not change are never
/// touched.
pub trait NodeStore {
    type Error: Error;

    /// Returns all persisted records of a holder, empty if nothing was stored.
    fn node_records(
        &self,
        holder: &HolderId,
    ) -> impl Future<Output = Result<BTreeSet<NodeRecord>, Self::Error>>;

    /// Applies deletions and then insertions for a holder.
    ///
    /// Deleting a record which does not exist or inserting one which already exists is not an
    /// error.
    fn apply_changes(
        &self,
        holder: &HolderId,
        changes: &Changes,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Removes all records of a holder, returns the number of removed records.
    fn delete_nodes(&self, holder: &HolderId) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Returns every user which has at least one persisted record.
    fn user_holders(&self) -> impl Future<Output = Result<BTreeSet<UserId>, Self::Error>>;
}
