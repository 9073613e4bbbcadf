// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::Deref;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use warden_core::{Equality, Node, UserId};

use crate::holder::{HolderId, PermissionHolder};

/// Longest username accepted.
pub const MAX_USERNAME_LENGTH: usize = 16;

#[derive(Debug)]
struct UserDetails {
    username: Option<String>,
    primary_group: String,
}

/// Holder identified by a UUID with a username and a stored primary group.
#[derive(Debug)]
pub struct User {
    id: UserId,
    holder: PermissionHolder,
    details: RwLock<UserDetails>,
}

impl User {
    /// Creates a user whose stored primary group is `default_group`.
    pub fn new(id: UserId, default_group: &str) -> Self {
        Self {
            id,
            holder: PermissionHolder::new(HolderId::User(id)),
            details: RwLock::new(UserDetails {
                username: None,
                primary_group: default_group.trim().to_lowercase(),
            }),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn holder(&self) -> &PermissionHolder {
        &self.holder
    }

    fn read_details(&self) -> RwLockReadGuard<'_, UserDetails> {
        self.details.read().expect("acquire shared read access on user")
    }

    fn write_details(&self) -> RwLockWriteGuard<'_, UserDetails> {
        self.details.write().expect("acquire exclusive write access on user")
    }

    pub fn username(&self) -> Option<String> {
        self.read_details().username.clone()
    }

    /// Sets the username, returns false if it was rejected.
    ///
    /// Names longer than 16 characters are rejected, empty names and `null` clear the username.
    pub fn set_username(&self, name: Option<&str>) -> bool {
        let name = name.map(str::trim).filter(|name| {
            !name.is_empty() && !name.eq_ignore_ascii_case("null")
        });
        if name.is_some_and(|name| name.chars().count() > MAX_USERNAME_LENGTH) {
            return false;
        }
        self.write_details().username = name.map(str::to_string);
        true
    }

    /// Primary group as stored for this user, ignoring overrides.
    pub fn stored_primary_group(&self) -> String {
        self.read_details().primary_group.clone()
    }

    pub fn set_primary_group(&self, group: &str) {
        let group = group.trim().to_lowercase();
        let changed = {
            let mut details = self.write_details();
            let changed = details.primary_group != group;
            details.primary_group = group;
            changed
        };
        if changed {
            self.holder.invalidate();
        }
    }

    /// Adds a membership of the default group if the user has no enduring group membership.
    ///
    /// Returns true if the user was changed.
    pub fn give_default_if_needed(&self, default_group: &str) -> bool {
        let has_parent = self
            .holder
            .enduring_nodes()
            .iter()
            .any(|node| node.is_group_node() && node.value());
        if has_parent {
            return false;
        }
        self.holder
            .set_permission(Node::inheritance(default_group).build());
        self.set_primary_group(default_group);
        true
    }

    /// Returns true if the user holds nothing but the plain default group membership.
    ///
    /// Such users don't need to be persisted.
    pub fn is_default(&self, default_group: &str) -> bool {
        let nodes = self.holder.enduring_nodes();
        let default = Node::inheritance(default_group).build();
        nodes.len() == 1
            && nodes[0].equals(&default, Equality::Exact)
            && self.stored_primary_group() == default.group_name().unwrap_or_default()
    }
}

impl Deref for User {
    type Target = PermissionHolder;

    fn deref(&self) -> &Self::Target {
        &self.holder
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use warden_core::Node;

    use super::User;

    #[test]
    fn username_rules() {
        let user = User::new(Uuid::from_u128(1), "default");
        assert!(user.set_username(Some("Notch")));
        assert_eq!(user.username(), Some("Notch".into()));

        assert!(!user.set_username(Some("a_name_which_is_far_too_long")));
        assert_eq!(user.username(), Some("Notch".into()));

        assert!(user.set_username(Some("null")));
        assert_eq!(user.username(), None);
        assert!(user.set_username(Some("  ")));
        assert_eq!(user.username(), None);
    }

    #[test]
    fn default_membership() {
        let user = User::new(Uuid::from_u128(1), "Default");
        assert_eq!(user.stored_primary_group(), "default");
        assert!(!user.is_default("default"));

        assert!(user.give_default_if_needed("default"));
        assert!(!user.give_default_if_needed("default"));
        assert!(user.is_default("default"));

        user.set_permission(Node::builder("chat.color").build());
        assert!(!user.is_default("default"));
    }

    #[test]
    fn existing_parent_prevents_default() {
        let user = User::new(Uuid::from_u128(1), "default");
        user.set_permission(Node::inheritance("vip").build());
        user.set_primary_group("vip");

        assert!(!user.give_default_if_needed("default"));
        assert_eq!(user.stored_primary_group(), "vip");
        assert!(!user.is_default("default"));
    }
}
