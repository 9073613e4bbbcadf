// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use warden_core::UserId;

/// What changed when a username was mapped to a user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingResult {
    /// Username previously mapped to the user, if it differed.
    pub previous_username: Option<String>,

    /// Another user the username was mapped to before, this mapping was replaced.
    pub displaced: Option<UserId>,
}

impl MappingResult {
    /// Returns true if nothing changed.
    pub fn is_clean(&self) -> bool {
        self.previous_username.is_none() && self.displaced.is_none()
    }
}

/// Interface for the one-to-one cache between usernames and user identifiers.
///
/// Usernames are passed in lowercase.
pub trait UuidCacheStore {
    type Error: Error;

    /// Maps the username to the user, replacing older mappings of both.
    fn save_mapping(
        &self,
        username: &str,
        id: UserId,
    ) -> impl Future<Output = Result<MappingResult, Self::Error>>;

    fn uuid_for(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserId>, Self::Error>>;

    fn username_for(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>>;
}
