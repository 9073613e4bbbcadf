// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::convert::Infallible;

use crate::memory::MemoryStore;
use crate::tracks::TrackStore;

impl TrackStore for MemoryStore {
    type Error = Infallible;

    async fn track_groups(&self, name: &str) -> Result<Option<Vec<String>>, Self::Error> {
        Ok(self.read().tracks.get(name).cloned())
    }

    async fn upsert_track(&self, name: &str, groups: &[String]) -> Result<(), Self::Error> {
        self.write().tracks.insert(name.to_string(), groups.to_vec());
        Ok(())
    }

    async fn delete_track(&self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.write().tracks.remove(name).is_some())
    }

    async fn track_names(&self) -> Result<BTreeSet<String>, Self::Error> {
        Ok(self.read().tracks.keys().cloned().collect())
    }
}
