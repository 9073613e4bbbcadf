// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use warden_core::LogEntry;

/// Interface for the append-only log of actions.
pub trait ActionLogStore {
    type Error: Error;

    fn insert_action(&self, entry: &LogEntry) -> impl Future<Output = Result<(), Self::Error>>;

    /// Returns all logged actions.
    fn actions(&self) -> impl Future<Output = Result<Vec<LogEntry>, Self::Error>>;
}
