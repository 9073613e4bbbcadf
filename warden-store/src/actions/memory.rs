// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use warden_core::LogEntry;

use crate::actions::ActionLogStore;
use crate::memory::MemoryStore;

impl ActionLogStore for MemoryStore {
    type Error = Infallible;

    async fn insert_action(&self, entry: &LogEntry) -> Result<(), Self::Error> {
        self.write().actions.push(entry.clone());
        Ok(())
    }

    async fn actions(&self) -> Result<Vec<LogEntry>, Self::Error> {
        Ok(self.read().actions.clone())
    }
}
