//! Shared domain types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When the platform store is allowed to release an item.
///
/// Fixed when the item is created; later updates never change it. The
/// engine only forwards this policy, enforcement belongs to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Accessibility {
    WhenUnlocked,
    #[default]
    WhenUnlockedThisDeviceOnly,
    AfterFirstUnlock,
    AfterFirstUnlockThisDeviceOnly,
    WhenPasscodeSetThisDeviceOnly,
}

impl Accessibility {
    /// All policies, in declaration order.
    pub const ALL: [Accessibility; 5] = [
        Accessibility::WhenUnlocked,
        Accessibility::WhenUnlockedThisDeviceOnly,
        Accessibility::AfterFirstUnlock,
        Accessibility::AfterFirstUnlockThisDeviceOnly,
        Accessibility::WhenPasscodeSetThisDeviceOnly,
    ];

    /// The wire name used in argument bags and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Accessibility::WhenUnlocked => "whenUnlocked",
            Accessibility::WhenUnlockedThisDeviceOnly => "whenUnlockedThisDeviceOnly",
            Accessibility::AfterFirstUnlock => "afterFirstUnlock",
            Accessibility::AfterFirstUnlockThisDeviceOnly => "afterFirstUnlockThisDeviceOnly",
            Accessibility::WhenPasscodeSetThisDeviceOnly => "whenPasscodeSetThisDeviceOnly",
        }
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accessibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Accessibility::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown accessibility policy: {s}"))
    }
}
