//! Typed facade over a [`SecureStore`].
//!
//! [`TypedSecureStore`] encodes values with a [`Codec`] before handing the
//! bytes to the backend and decodes them on the way back. It holds no item
//! state of its own: every call is a round trip to the backend, and no lock
//! is taken around encode-then-write or read-then-decode. A concurrent
//! `delete` between another caller's read and decode simply yields `None`.
//!
//! # Example
//!
//! ```rust
//! use codable_keychain::{AccessibilityPolicy, MemoryStore, TypedSecureStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! # fn main() -> codable_keychain::Result<()> {
//! let store = TypedSecureStore::new(MemoryStore::new());
//!
//! assert!(store.set(&User { name: "Ann".into() }, "u1")?);
//! assert_eq!(store.get::<User>("u1")?, Some(User { name: "Ann".into() }));
//! assert_eq!(store.backend().access_of("u1"), Some(AccessibilityPolicy::WhenUnlocked));
//!
//! assert!(store.delete("u1"));
//! assert_eq!(store.get::<User>("u1")?, None);
//! # Ok(())
//! # }
//! ```
//!
//! # Empty keys
//!
//! An empty key is rejected before the codec or the backend is consulted:
//! `set` returns `Ok(false)`, `get` returns `Ok(None)` and `delete` returns
//! `false`.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::access::AccessibilityPolicy;
use crate::backend::{SecureStore, platform_store};
use crate::codec::{Codec, CodecKind, JsonCodec};
use crate::config::KeychainConfig;
use crate::error::{CodableKeychainError, KeychainResult, Result};

/// Store built from a [`KeychainConfig`]: backend and codec picked at runtime.
pub type ConfiguredStore = TypedSecureStore<Box<dyn SecureStore>, CodecKind>;

/// Serializing key-value store over a secure byte backend.
#[derive(Debug, Clone)]
pub struct TypedSecureStore<S, C = JsonCodec> {
    backend: S,
    codec: C,
    default_access: AccessibilityPolicy,
}

impl<S: SecureStore> TypedSecureStore<S, JsonCodec> {
    /// Store with the JSON codec and [`AccessibilityPolicy::WhenUnlocked`]
    /// as defaults.
    pub fn new(backend: S) -> Self {
        Self::with_codec(backend, JsonCodec::new())
    }
}

impl ConfiguredStore {
    /// Build the backend and codec described by `config`.
    pub fn from_config(config: &KeychainConfig) -> KeychainResult<Self> {
        let backend = platform_store(config)?;
        tracing::debug!(
            service = %config.service,
            codec = %config.codec,
            default_access = %config.default_access,
            "typed secure store ready"
        );
        Ok(TypedSecureStore::with_codec(backend, config.codec).with_default_access(config.default_access))
    }
}

impl<S: SecureStore, C: Codec> TypedSecureStore<S, C> {
    /// Store with `codec` as the default codec.
    pub fn with_codec(backend: S, codec: C) -> Self {
        Self {
            backend,
            codec,
            default_access: AccessibilityPolicy::DEFAULT,
        }
    }

    /// Replace the policy used by [`set`](Self::set).
    pub fn with_default_access(mut self, access: AccessibilityPolicy) -> Self {
        self.default_access = access;
        self
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn default_access(&self) -> AccessibilityPolicy {
        self.default_access
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    // -- Defaulting operations ----------------------------------------------

    /// Store `value` under `key` with the default codec and policy.
    ///
    /// Returns whether the backend confirmed the write.
    pub fn set<T>(&self, value: &T, key: &str) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.set_with(value, key, &self.codec, self.default_access)
    }

    /// Store `value` under `key` with the default codec and an explicit
    /// policy.
    pub fn set_with_access<T>(&self, value: &T, key: &str, access: AccessibilityPolicy) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.set_with(value, key, &self.codec, access)
    }

    /// Read the value under `key` with the default codec.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.get_with(key, &self.codec)
    }

    // -- Explicit operations ------------------------------------------------

    /// Encode `value` with `codec` and write it under `key`, protected per
    /// `access`.
    ///
    /// # Errors
    ///
    /// Returns [`CodableKeychainError::EncodingFailed`] if `codec` rejects
    /// the value. The backend is not touched in that case.
    pub fn set_with<T, K>(&self, value: &T, key: &str, codec: &K, access: AccessibilityPolicy) -> Result<bool>
    where
        T: Serialize + ?Sized,
        K: Codec,
    {
        if key.is_empty() {
            tracing::warn!("refusing to store an item under an empty key");
            return Ok(false);
        }

        let bytes = codec.encode(value).map_err(|e| {
            tracing::debug!(key = %key, error = %e, "encoding failed");
            CodableKeychainError::EncodingFailed {
                reason: e.to_string(),
            }
        })?;

        let stored = self.backend.set_bytes(key, &bytes, access);
        tracing::debug!(key = %key, bytes = bytes.len(), access = %access, stored, "set");
        Ok(stored)
    }

    /// Read the bytes under `key` and decode them with `codec`.
    ///
    /// Returns `Ok(None)` when nothing is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CodableKeychainError::DecodingFailed`] if bytes were found
    /// but `codec` cannot produce a `T` from them, including when they were
    /// written as a different type.
    pub fn get_with<T, K>(&self, key: &str, codec: &K) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        K: Codec,
    {
        if key.is_empty() {
            tracing::warn!("refusing to read an item under an empty key");
            return Ok(None);
        }

        let Some(bytes) = self.backend.get_bytes(key) else {
            tracing::debug!(key = %key, "get: no item");
            return Ok(None);
        };

        let value = codec.decode(&bytes).map_err(|e| {
            tracing::debug!(key = %key, error = %e, "decoding failed");
            CodableKeychainError::DecodingFailed {
                reason: e.to_string(),
            }
        })?;

        tracing::debug!(key = %key, bytes = bytes.len(), "get");
        Ok(Some(value))
    }

    /// Remove the item under `key`.
    ///
    /// Returns the backend's answer; the bundled backends report `true` for a
    /// key that was never stored.
    pub fn delete(&self, key: &str) -> bool {
        if key.is_empty() {
            tracing::warn!("refusing to delete an item under an empty key");
            return false;
        }

        let deleted = self.backend.delete_key(key);
        tracing::debug!(key = %key, deleted, "delete");
        deleted
    }
}
