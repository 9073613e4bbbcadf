// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use warden_auth::ResolverConfiguration;

/// Default interval in which expired temporary nodes are removed from loaded holders.
pub const DEFAULT_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(3);

/// Configuration parameters for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfiguration {
    /// Resolution, caching and primary group settings of the registry.
    pub resolver: ResolverConfiguration,

    /// Interval of the expiry audit run by
    /// [`Engine::run_housekeeping`](crate::Engine::run_housekeeping).
    ///
    /// Default: 3 seconds.
    pub housekeeping_interval: Duration,

    /// If true every successful mutation done through the engine is recorded in the action log.
    ///
    /// Default: `true`.
    pub log_actions: bool,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            resolver: ResolverConfiguration::default(),
            housekeeping_interval: DEFAULT_HOUSEKEEPING_INTERVAL,
            log_actions: true,
        }
    }
}

impl EngineConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolver(mut self, config: ResolverConfiguration) -> Self {
        self.resolver = config;
        self
    }

    pub fn housekeeping_interval(mut self, interval: Duration) -> Self {
        self.housekeeping_interval = interval;
        self
    }

    pub fn log_actions(mut self, value: bool) -> Self {
        self.log_actions = value;
        self
    }
}
