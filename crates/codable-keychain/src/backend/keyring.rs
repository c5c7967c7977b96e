//! OS keyring backend (Linux Secret Service, Windows Credential Manager).
//!
//! Built on the `keyring` crate. The service name scopes the store and the
//! item key is the keyring user. A fresh `Entry` is created for every call.
//!
//! Neither Secret Service nor Credential Manager has a notion of lock-state
//! accessibility classes, so the policy is accepted and logged but does not
//! change how the item is stored. Secret Service collections are unlocked
//! with the user session, which matches `WhenUnlocked`.

use ::keyring::Entry;

use super::SecureStore;
use crate::access::AccessibilityPolicy;
use crate::error::{KeychainError, KeychainResult};

/// [`SecureStore`] over the platform keyring.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> KeychainResult<Entry> {
        Entry::new(&self.service, key).map_err(|e| unavailable("open entry", e))
    }

    fn write_item(&self, key: &str, bytes: &[u8]) -> KeychainResult<()> {
        self.entry(key)?
            .set_secret(bytes)
            .map_err(|e| unavailable("write", e))
    }

    fn read_item(&self, key: &str) -> KeychainResult<Option<Vec<u8>>> {
        match self.entry(key)?.get_secret() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(::keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(unavailable("read", e)),
        }
    }

    fn remove_item(&self, key: &str) -> KeychainResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(unavailable("delete", e)),
        }
    }
}

fn unavailable(op: &str, e: ::keyring::Error) -> KeychainError {
    KeychainError::KeychainUnavailable {
        reason: format!("keyring {op} failed: {e}"),
    }
}

impl SecureStore for KeyringStore {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        match self.write_item(key, bytes) {
            Ok(()) => {
                tracing::debug!(
                    service = %self.service,
                    key = %key,
                    bytes = bytes.len(),
                    access = %access,
                    "stored item in OS keyring (accessibility not enforced by this backend)"
                );
                true
            }
            Err(e) => {
                tracing::error!(service = %self.service, key = %key, error = %e, "keyring write failed");
                false
            }
        }
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.read_item(key) {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(service = %self.service, key = %key, error = %e, "keyring read failed");
                None
            }
        }
    }

    fn delete_key(&self, key: &str) -> bool {
        match self.remove_item(key) {
            Ok(()) => {
                tracing::info!(service = %self.service, key = %key, "deleted item from OS keyring");
                true
            }
            Err(e) => {
                tracing::error!(service = %self.service, key = %key, error = %e, "keyring delete failed");
                false
            }
        }
    }
}
