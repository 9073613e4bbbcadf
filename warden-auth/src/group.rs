// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use crate::holder::{HolderId, PermissionHolder};

/// Named holder which other holders can inherit from through `group.<name>` nodes.
#[derive(Debug)]
pub struct Group {
    name: String,
    holder: PermissionHolder,
}

impl Group {
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self {
            holder: PermissionHolder::new(HolderId::Group(name.clone())),
            name,
        }
    }

    /// Lowercase name of this group.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holder(&self) -> &PermissionHolder {
        &self.holder
    }
}

impl Deref for Group {
    type Target = PermissionHolder;

    fn deref(&self) -> &Self::Target {
        &self.holder
    }
}

/// Look up loaded groups by name.
///
/// Resolution only sees groups returned here, unknown names are skipped.
pub trait GroupLookup {
    fn group(&self, name: &str) -> Option<Arc<Group>>;
}

impl GroupLookup for HashMap<String, Arc<Group>> {
    fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.get(name).cloned()
    }
}
