// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use warden_core::UserId;

use crate::memory::MemoryStore;
use crate::uuids::{MappingResult, UuidCacheStore};

impl UuidCacheStore for MemoryStore {
    type Error = Infallible;

    async fn save_mapping(&self, username: &str, id: UserId) -> Result<MappingResult, Self::Error> {
        let mut state = self.write();

        let previous_username = state
            .uuids
            .iter()
            .find(|(name, mapped)| **mapped == id && name.as_str() != username)
            .map(|(name, _)| name.clone());
        state.uuids.retain(|_, mapped| *mapped != id);

        let displaced = state
            .uuids
            .insert(username.to_string(), id)
            .filter(|other| *other != id);

        Ok(MappingResult {
            previous_username,
            displaced,
        })
    }

    async fn uuid_for(&self, username: &str) -> Result<Option<UserId>, Self::Error> {
        Ok(self.read().uuids.get(username).copied())
    }

    async fn username_for(&self, id: UserId) -> Result<Option<String>, Self::Error> {
        Ok(self
            .read()
            .uuids
            .iter()
            .find(|(_, mapped)| **mapped == id)
            .map(|(name, _)| name.clone()))
    }
}
