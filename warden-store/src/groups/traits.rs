// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::error::Error;

/// Interface for storing which groups exist.
///
/// The nodes of a group are kept in the [`NodeStore`](crate::NodeStore).
pub trait GroupStore {
    type Error: Error;

    fn has_group(&self, name: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Returns `false` if the group already existed.
    fn insert_group(&self, name: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Returns `false` if the group did not exist.
    fn delete_group(&self, name: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    fn group_names(&self) -> impl Future<Output = Result<BTreeSet<String>, Self::Error>>;
}
