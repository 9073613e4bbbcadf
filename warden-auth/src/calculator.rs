// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission checks over resolved nodes.
use std::collections::HashMap;

use warden_core::Tristate;

use crate::resolver::LocalizedNode;

/// Flattened permission values of a holder for one query.
///
/// Built from the resolved node list, the first node found for a key wins as the resolved list
/// is already ordered from highest to lowest priority.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionData {
    values: HashMap<String, bool>,
    apply_wildcards: bool,
    grant_undefined: bool,
}

impl PermissionData {
    pub fn new(resolved: &[LocalizedNode]) -> Self {
        let mut values = HashMap::with_capacity(resolved.len());
        for localized in resolved {
            let node = localized.node();
            values
                .entry(node.key().to_string())
                .or_insert(node.value());
        }
        Self {
            values,
            apply_wildcards: true,
            grant_undefined: false,
        }
    }

    /// Controls if `a.*` style nodes match `a.b`. Default: `true`.
    pub fn apply_wildcards(mut self, value: bool) -> Self {
        self.apply_wildcards = value;
        self
    }

    /// Treats permissions no node matched as granted. Default: `false`.
    pub fn grant_undefined(mut self, value: bool) -> Self {
        self.grant_undefined = value;
        self
    }

    /// Checks a permission.
    ///
    /// An exact match wins over wildcards. Otherwise wildcard ancestors are tried from the most
    /// to the least specific one: `a.b.c` is looked up as `a.b.*`, then `a.*` and finally `*`.
    pub fn check(&self, permission: &str) -> Tristate {
        let permission = permission.trim().to_lowercase();

        if let Some(value) = self.values.get(&permission) {
            return (*value).into();
        }

        if self.apply_wildcards {
            let mut current = permission.as_str();
            while let Some(index) = current.rfind('.') {
                current = &current[..index];
                if let Some(value) = self.values.get(&format!("{current}.*")) {
                    return (*value).into();
                }
            }
            if let Some(value) = self.values.get("*") {
                return (*value).into();
            }
        }

        if self.grant_undefined {
            Tristate::True
        } else {
            Tristate::Undefined
        }
    }

    /// All resolved permission keys with their winning values.
    pub fn values(&self) -> &HashMap<String, bool> {
        &self.values
    }
}
