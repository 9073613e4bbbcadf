// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration of resolution, caching and primary group calculation.
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::primary_group::PrimaryGroupCalculation;

/// Default time window in which repeated requests to refresh all users are coalesced.
pub const DEFAULT_REFRESH_DEBOUNCE: Duration = Duration::from_millis(50);

/// Default name of the group every user is a member of unless it has another membership.
pub const DEFAULT_GROUP: &str = "default";

/// Configuration parameters for a [`Registry`](crate::Registry).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolverConfiguration {
    /// Window in which repeated requests to refresh all user caches are collapsed into one
    /// refresh. A refresh runs once the window passed without further requests.
    ///
    /// Default: 50 ms.
    pub refresh_debounce: Duration,

    /// How the effective primary group of a user is determined.
    ///
    /// Default: `Stored`.
    pub primary_group_calculation: PrimaryGroupCalculation,

    /// If true a `primarygroup` meta override is only accepted when the user inherits from the
    /// named group.
    ///
    /// Default: `true`.
    pub primary_group_override_requires_membership: bool,

    /// If true `a.*` style nodes grant or deny all permissions below `a`.
    ///
    /// Default: `true`.
    pub apply_wildcards: bool,

    /// If true permissions which are not defined for a holder are granted when the query has the
    /// op flag set.
    ///
    /// Default: `false`.
    pub op_grants_undefined: bool,

    /// Group users fall back to when they have no other enduring membership.
    ///
    /// Default: `default`.
    pub default_group: String,
}

impl Default for ResolverConfiguration {
    fn default() -> Self {
        Self {
            refresh_debounce: DEFAULT_REFRESH_DEBOUNCE,
            primary_group_calculation: PrimaryGroupCalculation::default(),
            primary_group_override_requires_membership: true,
            apply_wildcards: true,
            op_grants_undefined: false,
            default_group: DEFAULT_GROUP.to_string(),
        }
    }
}

impl ResolverConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_debounce(mut self, window: Duration) -> Self {
        self.refresh_debounce = window;
        self
    }

    pub fn primary_group_calculation(mut self, calculation: PrimaryGroupCalculation) -> Self {
        self.primary_group_calculation = calculation;
        self
    }

    pub fn primary_group_override_requires_membership(mut self, value: bool) -> Self {
        self.primary_group_override_requires_membership = value;
        self
    }

    pub fn apply_wildcards(mut self, value: bool) -> Self {
        self.apply_wildcards = value;
        self
    }

    pub fn op_grants_undefined(mut self, value: bool) -> Self {
        self.op_grants_undefined = value;
        self
    }

    pub fn default_group(mut self, name: &str) -> Self {
        self.default_group = name.trim().to_lowercase();
        self
    }
}
