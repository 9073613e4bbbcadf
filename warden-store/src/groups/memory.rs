// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::convert::Infallible;

use crate::groups::GroupStore;
use crate::memory::MemoryStore;

impl GroupStore for MemoryStore {
    type Error = Infallible;

    async fn has_group(&self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.read().groups.contains(name))
    }

    async fn insert_group(&self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.write().groups.insert(name.to_string()))
    }

    async fn delete_group(&self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.write().groups.remove(name))
    }

    async fn group_names(&self) -> Result<BTreeSet<String>, Self::Error> {
        Ok(self.read().groups.clone())
    }
}
