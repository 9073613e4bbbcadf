// SPDX-License-Identifier: MIT OR Apache-2.0

//! Calculation of a user's effective primary group.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use warden_core::QueryOptions;

use crate::group::GroupLookup;
use crate::meta::MetaData;
use crate::resolver::LocalizedNode;
use crate::user::User;

/// Strategy to determine the primary group of a user.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PrimaryGroupCalculation {
    /// The primary group stored with the user.
    #[default]
    Stored,

    /// The heaviest group the user directly inherits from under the query, falling back to the
    /// stored group.
    ParentsByWeight,

    /// The heaviest group found anywhere in the user's resolved inheritance, falling back to the
    /// stored group.
    AllParentsByWeight,
}

/// Computes the primary group of a user.
///
/// A `primarygroup` meta value overrides the calculation if the named group is loaded and, when
/// `require_membership` is set, the user inherits from it under the query. An invalid override is
/// ignored.
pub(crate) fn calculate<G: GroupLookup>(
    groups: &G,
    user: &User,
    query: &QueryOptions,
    resolved: &[LocalizedNode],
    meta: &MetaData,
    calculation: PrimaryGroupCalculation,
    require_membership: bool,
) -> String {
    // Memberships are taken from the resolved inheritance nodes, groups without applicable nodes
    // of their own are inherited all the same.
    let inherited: Vec<&str> = resolved
        .iter()
        .map(LocalizedNode::node)
        .filter(|node| node.value())
        .filter_map(|node| node.group_name())
        .collect();

    if let Some(name) = meta.meta_value(crate::meta::PRIMARY_GROUP_META_KEY) {
        let name = name.trim().to_lowercase();
        let loaded = groups.group(&name).is_some();
        let member = !require_membership || inherited.contains(&name.as_str());
        if loaded && member {
            return name;
        }
    }

    let candidates: Vec<String> = match calculation {
        PrimaryGroupCalculation::Stored => Vec::new(),
        PrimaryGroupCalculation::ParentsByWeight => user.parent_groups(query),
        PrimaryGroupCalculation::AllParentsByWeight => {
            let mut names: Vec<String> = Vec::new();
            for name in inherited {
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
            }
            names
        }
    };

    // First of the heaviest candidates wins.
    let mut best: Option<(u32, String)> = None;
    for name in candidates {
        let Some(group) = groups.group(&name) else {
            continue;
        };
        let weight = group.weight().unwrap_or_default();
        if best.as_ref().is_none_or(|(current, _)| weight > *current) {
            best = Some((weight, name));
        }
    }

    best.map(|(_, name)| name)
        .unwrap_or_else(|| user.stored_primary_group())
}
