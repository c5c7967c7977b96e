//! Typed values in the OS keychain.
//!
//! This crate stores any `serde` value under a string key in a protected
//! credential store. Three pieces cooperate:
//!
//! - [`codec`] — turns values into bytes and back (JSON by default, bincode
//!   available).
//! - [`backend`] — keeps bytes in protected storage: macOS Keychain, the
//!   Linux/Windows keyring (feature `os-keyring`), an encrypted file store, or
//!   memory.
//! - [`store`] — [`TypedSecureStore`], the typed `set`/`get`/`delete` facade
//!   tying a codec to a backend and applying the default
//!   [`AccessibilityPolicy`].
//!
//! Supporting modules:
//!
//! - [`access`] — accessibility classes.
//! - [`config`] — TOML-loadable configuration.
//! - [`crypto`] — AES-256-GCM primitives for the file store.
//! - [`error`] — error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use codable_keychain::{AccessibilityPolicy, KeychainConfig, TypedSecureStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KeychainConfig::new().with_service("com.example.app");
//! let store = TypedSecureStore::from_config(&config)?;
//!
//! store.set(&vec!["refresh-token", "access-token"], "tokens")?;
//! store.set_with_access(&"hunter2", "password", AccessibilityPolicy::WhenUnlockedThisDeviceOnly)?;
//!
//! let tokens: Option<Vec<String>> = store.get("tokens")?;
//! store.delete("tokens");
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod backend;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use access::AccessibilityPolicy;
pub use backend::{FileStore, MemoryStore, Prefixed, SecureStore, platform_store};
pub use codec::{BincodeCodec, Codec, CodecKind, JsonCodec};
pub use config::{BackendKind, KeychainConfig};
pub use error::{CodableKeychainError, KeychainError, Result};
pub use store::{ConfiguredStore, TypedSecureStore};
