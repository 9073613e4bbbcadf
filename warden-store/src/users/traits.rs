// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::error::Error;

use warden_core::UserId;

/// Per-user data persisted next to the nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserData {
    /// Last known username, lowercased.
    pub username: Option<String>,
    pub primary_group: String,
}

/// Interface for storing user data.
pub trait UserStore {
    type Error: Error;

    fn user_data(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<UserData>, Self::Error>>;

    /// Inserts or replaces the data of a user.
    fn upsert_user(
        &self,
        id: UserId,
        data: &UserData,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Removes the data of a user, returns `false` if nothing was stored.
    fn delete_user(&self, id: UserId) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Returns every user with stored data.
    fn user_ids(&self) -> impl Future<Output = Result<BTreeSet<UserId>, Self::Error>>;
}
