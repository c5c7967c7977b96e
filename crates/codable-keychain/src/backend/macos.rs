//! macOS Keychain Services backend.
//!
//! Items are generic passwords: the service name scopes the store and the
//! item key is the account name. Every call goes straight to the Security
//! framework; no handle or item is cached between calls.
//!
//! Accessibility policies map onto keychain protection classes:
//!
//! | policy | protection class |
//! |---|---|
//! | `WhenUnlocked` | `kSecAttrAccessibleWhenUnlocked` |
//! | `WhenUnlockedThisDeviceOnly` | `kSecAttrAccessibleWhenUnlockedThisDeviceOnly` |
//! | `Always` | `kSecAttrAccessibleAfterFirstUnlock` |
//!
//! `kSecAttrAccessibleAlways` is deprecated by the platform; `Always` uses the
//! least restrictive class that is still supported.
//!
//! An item updated in place keeps its original protection class, so an
//! overwrite deletes the old item and adds a new one. The previous value is
//! read first and written back if the add fails. Between the delete and the
//! add a concurrent reader may see the key as absent, and a restored item
//! gets the keychain's default protection class.

use security_framework::access_control::{ProtectionMode, SecAccessControl};
use security_framework::base::Error as SecError;
use security_framework::passwords::{
    PasswordOptions, delete_generic_password, get_generic_password, set_generic_password,
    set_generic_password_options,
};

use super::SecureStore;
use crate::access::AccessibilityPolicy;
use crate::error::{KeychainError, KeychainResult};

/// `errSecItemNotFound`.
const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

/// [`SecureStore`] over the user's login keychain.
#[derive(Debug, Clone)]
pub struct MacOSKeychain {
    service: String,
}

impl MacOSKeychain {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn protection_mode(access: AccessibilityPolicy) -> ProtectionMode {
        match access {
            AccessibilityPolicy::WhenUnlocked => ProtectionMode::AccessibleWhenUnlocked,
            AccessibilityPolicy::WhenUnlockedThisDeviceOnly => {
                ProtectionMode::AccessibleWhenUnlockedThisDeviceOnly
            }
            AccessibilityPolicy::Always => ProtectionMode::AccessibleAfterFirstUnlock,
        }
    }

    fn read_item(&self, key: &str) -> KeychainResult<Option<Vec<u8>>> {
        match get_generic_password(&self.service, key) {
            Ok(data) => Ok(Some(data.to_vec())),
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(unavailable("read", e)),
        }
    }

    fn remove_item(&self, key: &str) -> KeychainResult<()> {
        match delete_generic_password(&self.service, key) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(()),
            Err(e) => Err(unavailable("delete", e)),
        }
    }

    fn add_item(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> KeychainResult<()> {
        let access_control =
            SecAccessControl::create_with_protection(Some(Self::protection_mode(access)), 0)
                .map_err(|e| unavailable("access control", e))?;
        let mut options = PasswordOptions::new_generic_password(&self.service, key);
        options.set_access_control(access_control);
        set_generic_password_options(bytes, options).map_err(|e| unavailable("add", e))
    }

    fn write_item(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> KeychainResult<()> {
        let previous = self.read_item(key)?;
        if previous.is_some() {
            self.remove_item(key)?;
        }

        let Err(e) = self.add_item(key, bytes, access) else {
            return Ok(());
        };
        if let Some(old) = previous {
            match set_generic_password(&self.service, key, &old) {
                Ok(()) => tracing::warn!(key = %key, "restored previous keychain item after failed write"),
                Err(restore) => {
                    tracing::error!(key = %key, error = %restore, "previous keychain item could not be restored");
                }
            }
        }
        Err(e)
    }
}

fn unavailable(op: &str, e: SecError) -> KeychainError {
    KeychainError::KeychainUnavailable {
        reason: format!("keychain {op} failed (OSStatus {}): {e}", e.code()),
    }
}

impl SecureStore for MacOSKeychain {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        match self.write_item(key, bytes, access) {
            Ok(()) => {
                tracing::debug!(
                    service = %self.service,
                    key = %key,
                    bytes = bytes.len(),
                    access = %access,
                    "stored item in macOS keychain"
                );
                true
            }
            Err(e) => {
                tracing::error!(key = %key, access = %access, error = %e, "macOS keychain write failed");
                false
            }
        }
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.read_item(key) {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "macOS keychain read failed");
                None
            }
        }
    }

    fn delete_key(&self, key: &str) -> bool {
        match self.remove_item(key) {
            Ok(()) => {
                tracing::info!(service = %self.service, key = %key, "deleted item from macOS keychain");
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "macOS keychain delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        let kc = MacOSKeychain::new("com.example.app");
        assert_eq!(kc.service(), "com.example.app");
    }

    #[test]
    fn platform_errors_map_to_unavailable() {
        // errSecInteractionNotAllowed: keychain locked, no UI.
        let err = unavailable("add", SecError::from_code(-25308));
        match err {
            KeychainError::KeychainUnavailable { reason } => {
                assert!(reason.contains("add"));
                assert!(reason.contains("-25308"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Talks to the real login keychain under a per-process service name.
    #[test]
    #[ignore = "requires unlocked macOS Keychain; run manually with --ignored"]
    fn keychain_roundtrip() {
        let kc = MacOSKeychain::new(&format!("codable-keychain.test.{}", std::process::id()));
        let _ = kc.delete_key("item");

        assert_eq!(kc.get_bytes("item"), None);
        assert!(kc.set_bytes("item", b"one", AccessibilityPolicy::WhenUnlocked));
        assert_eq!(kc.get_bytes("item"), Some(b"one".to_vec()));

        assert!(kc.set_bytes("item", b"two", AccessibilityPolicy::WhenUnlockedThisDeviceOnly));
        assert_eq!(kc.get_bytes("item"), Some(b"two".to_vec()));

        assert!(kc.delete_key("item"));
        assert_eq!(kc.get_bytes("item"), None);
        assert!(kc.delete_key("item"));
    }

    /// A failing add must leave the previous value readable.
    #[test]
    #[ignore = "requires unlocked macOS Keychain; run manually with --ignored"]
    fn failed_overwrite_keeps_previous_value() {
        let kc = MacOSKeychain::new(&format!("codable-keychain.test.restore.{}", std::process::id()));
        let _ = kc.delete_key("item");
        assert!(kc.set_bytes("item", b"old", AccessibilityPolicy::WhenUnlocked));

        // Whether the add is rejected depends on the host keychain.
        if !kc.set_bytes("item", b"new", AccessibilityPolicy::WhenUnlockedThisDeviceOnly) {
            assert_eq!(kc.get_bytes("item"), Some(b"old".to_vec()));
        }
        assert!(kc.delete_key("item"));
    }
}
