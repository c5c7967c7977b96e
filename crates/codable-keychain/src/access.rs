//! Keychain accessibility classes.
//!
//! An [`AccessibilityPolicy`] tells the backing store when an item may be
//! read and whether it may leave the device through backups. The policy is
//! supplied on every write; it is not reported back on reads.

use serde::{Deserialize, Serialize};

/// When a stored item should be readable.
///
/// Defaults to [`AccessibilityPolicy::WhenUnlocked`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessibilityPolicy {
    /// Readable only while the device is unlocked. Migrates to a new device
    /// with encrypted backups.
    #[default]
    WhenUnlocked,
    /// Readable only while the device is unlocked. Never migrates; after a
    /// restore from another device's backup the item is absent.
    WhenUnlockedThisDeviceOnly,
    /// Readable regardless of lock state. Migrates with encrypted backups.
    Always,
}

impl AccessibilityPolicy {
    /// The policy applied when the caller does not pick one.
    pub const DEFAULT: Self = Self::WhenUnlocked;

    /// Every policy, in declaration order.
    pub const ALL: [Self; 3] = [
        Self::WhenUnlocked,
        Self::WhenUnlockedThisDeviceOnly,
        Self::Always,
    ];

    /// Stable string form, also used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhenUnlocked => "when_unlocked",
            Self::WhenUnlockedThisDeviceOnly => "when_unlocked_this_device_only",
            Self::Always => "always",
        }
    }

    /// Parse the string form produced by [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "when_unlocked" => Some(Self::WhenUnlocked),
            "when_unlocked_this_device_only" => Some(Self::WhenUnlockedThisDeviceOnly),
            "always" => Some(Self::Always),
            _ => None,
        }
    }

    /// Whether the item may travel to another device via encrypted backups.
    pub fn migrates(&self) -> bool {
        !matches!(self, Self::WhenUnlockedThisDeviceOnly)
    }

    /// Whether the item requires the device to be unlocked to be read.
    pub fn requires_unlock(&self) -> bool {
        !matches!(self, Self::Always)
    }

    /// One-byte tag used by backends that persist the policy alongside the
    /// item.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::WhenUnlocked => 0,
            Self::WhenUnlockedThisDeviceOnly => 1,
            Self::Always => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.tag() == tag)
    }
}

impl std::fmt::Display for AccessibilityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessibilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown accessibility policy: {s}"))
    }
}
