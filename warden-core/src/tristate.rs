// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of a permission check.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Tristate {
    /// A node granting the permission was found.
    True,

    /// A node denying the permission was found.
    False,

    /// No node matched, the caller decides what this means.
    #[default]
    Undefined,
}

impl Tristate {
    /// Returns the boolean value of this state, treating `Undefined` as `false`.
    pub fn as_bool(&self) -> bool {
        matches!(self, Tristate::True)
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Tristate::Undefined)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value { Tristate::True } else { Tristate::False }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Tristate::Undefined,
        }
    }
}
