// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of a mutation on a holder or track.
///
/// Conflicts are regular outcomes and not errors, callers can branch on them directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MutateResult {
    Success,

    /// The node or group to be added is already present.
    AlreadyHas,

    /// The node or group to be removed is not present.
    Lacks,

    /// The mutation could not be carried out.
    Fail,
}

impl MutateResult {
    pub fn was_success(&self) -> bool {
        matches!(self, MutateResult::Success)
    }
}
