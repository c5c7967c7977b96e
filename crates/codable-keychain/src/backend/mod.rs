//! Secure byte stores.
//!
//! The typed store never talks to a keychain directly. It goes through the
//! [`SecureStore`] trait, which every backend adapter implements:
//!
//! - [`MemoryStore`] — in-process map, records writes (tests, ephemeral use)
//! - [`FileStore`] — encrypted file per item, cross-platform fallback
//! - `MacOSKeychain` — Keychain Services via `security-framework` (macOS)
//! - `KeyringStore` — Secret Service / Credential Manager via `keyring`
//!   (Linux and Windows, feature `os-keyring`)
//!
//! Backend failures never become errors at this boundary: writes and deletes
//! report `false`, reads report `None`, and the adapter logs the cause.
//!
//! # Deleting absent keys
//!
//! Every bundled adapter returns `true` from [`SecureStore::delete_key`] when
//! the key was not present: the call succeeds when no item remains under the
//! key afterwards.

pub mod file;
#[cfg(all(feature = "os-keyring", any(target_os = "linux", target_os = "windows")))]
pub mod keyring;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod memory;

use std::sync::Arc;

use crate::access::AccessibilityPolicy;
use crate::config::{BackendKind, KeychainConfig};
use crate::error::KeychainResult;

pub use file::FileStore;
#[cfg(all(feature = "os-keyring", any(target_os = "linux", target_os = "windows")))]
pub use self::keyring::KeyringStore;
#[cfg(target_os = "macos")]
pub use macos::MacOSKeychain;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A key-value store for raw bytes backed by protected storage.
///
/// Implementations must be `Send + Sync`; the typed store adds no locking of
/// its own, so concurrent calls are serialized only as far as the backend
/// serializes them.
pub trait SecureStore: Send + Sync {
    /// Write (or overwrite) `bytes` under `key`, protected per `access`.
    ///
    /// Returns `true` when the backend confirms the write.
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool;

    /// Read the bytes stored under `key`, or `None` when there are none.
    fn get_bytes(&self, key: &str) -> Option<Vec<u8>>;

    /// Remove the item under `key`.
    ///
    /// Returns `true` when no item remains under `key`.
    fn delete_key(&self, key: &str) -> bool;
}

impl<S: SecureStore + ?Sized> SecureStore for &S {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        (**self).set_bytes(key, bytes, access)
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        (**self).get_bytes(key)
    }

    fn delete_key(&self, key: &str) -> bool {
        (**self).delete_key(key)
    }
}

impl<S: SecureStore + ?Sized> SecureStore for Box<S> {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        (**self).set_bytes(key, bytes, access)
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        (**self).get_bytes(key)
    }

    fn delete_key(&self, key: &str) -> bool {
        (**self).delete_key(key)
    }
}

impl<S: SecureStore + ?Sized> SecureStore for Arc<S> {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        (**self).set_bytes(key, bytes, access)
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        (**self).get_bytes(key)
    }

    fn delete_key(&self, key: &str) -> bool {
        (**self).delete_key(key)
    }
}

// ---------------------------------------------------------------------------
// Key prefix
// ---------------------------------------------------------------------------

/// Namespaces every key of an inner store with a fixed prefix.
///
/// Lets several applications (or test runs) share one keychain service
/// without colliding. The prefix is applied verbatim, no separator is added.
#[derive(Debug, Clone)]
pub struct Prefixed<S> {
    prefix: String,
    inner: S,
}

impl<S: SecureStore> Prefixed<S> {
    pub fn new(prefix: impl Into<String>, inner: S) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl<S: SecureStore> SecureStore for Prefixed<S> {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        self.inner.set_bytes(&self.full_key(key), bytes, access)
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get_bytes(&self.full_key(key))
    }

    fn delete_key(&self, key: &str) -> bool {
        self.inner.delete_key(&self.full_key(key))
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the backend described by `config`.
///
/// For [`BackendKind::Platform`]:
/// - **macOS**: [`MacOSKeychain`] scoped to `config.service`
/// - **Linux / Windows with `os-keyring`**: `KeyringStore` scoped to
///   `config.service`
/// - **Otherwise**: [`FileStore`] under `config.data_dir`
///
/// A configured `key_prefix` wraps the result in [`Prefixed`].
pub fn platform_store(config: &KeychainConfig) -> KeychainResult<Box<dyn SecureStore>> {
    config.validate()?;

    let store: Box<dyn SecureStore> = match config.backend {
        BackendKind::Memory => {
            tracing::info!("using in-memory secure store");
            Box::new(MemoryStore::new())
        }
        BackendKind::File => {
            tracing::info!(path = %config.data_dir.display(), "using encrypted file store");
            Box::new(FileStore::open(&config.data_dir)?)
        }
        BackendKind::Platform => native_store(config)?,
    };

    Ok(match &config.key_prefix {
        Some(prefix) => Box::new(Prefixed::new(prefix.clone(), store)),
        None => store,
    })
}

#[cfg(target_os = "macos")]
fn native_store(config: &KeychainConfig) -> KeychainResult<Box<dyn SecureStore>> {
    tracing::info!(service = %config.service, "using macOS Keychain Services");
    Ok(Box::new(MacOSKeychain::new(&config.service)))
}

#[cfg(all(feature = "os-keyring", any(target_os = "linux", target_os = "windows")))]
fn native_store(config: &KeychainConfig) -> KeychainResult<Box<dyn SecureStore>> {
    tracing::info!(service = %config.service, "using OS keyring");
    Ok(Box::new(KeyringStore::new(&config.service)))
}

#[cfg(not(any(
    target_os = "macos",
    all(feature = "os-keyring", any(target_os = "linux", target_os = "windows"))
)))]
fn native_store(config: &KeychainConfig) -> KeychainResult<Box<dyn SecureStore>> {
    tracing::info!(
        path = %config.data_dir.display(),
        "no native keychain on this platform; using encrypted file store"
    );
    Ok(Box::new(FileStore::open(&config.data_dir)?))
}
