// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::error::Error;

/// Interface for storing tracks as ordered lists of group names.
pub trait TrackStore {
    type Error: Error;

    /// Returns the groups of a track in order or `None` if the track does not exist.
    fn track_groups(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>, Self::Error>>;

    /// Inserts a track or replaces its groups.
    fn upsert_track(
        &self,
        name: &str,
        groups: &[String],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Returns `false` if the track did not exist.
    fn delete_track(&self, name: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    fn track_names(&self) -> impl Future<Output = Result<BTreeSet<String>, Self::Error>>;
}
