// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::convert::Infallible;

use warden_core::UserId;

use crate::memory::MemoryStore;
use crate::users::{UserData, UserStore};

impl UserStore for MemoryStore {
    type Error = Infallible;

    async fn user_data(&self, id: UserId) -> Result<Option<UserData>, Self::Error> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn upsert_user(&self, id: UserId, data: &UserData) -> Result<(), Self::Error> {
        self.write().users.insert(id, data.clone());
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, Self::Error> {
        Ok(self.write().users.remove(&id).is_some())
    }

    async fn user_ids(&self) -> Result<BTreeSet<UserId>, Self::Error> {
        Ok(self.read().users.keys().copied().collect())
    }
}
