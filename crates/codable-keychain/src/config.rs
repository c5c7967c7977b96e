//! Store configuration.
//!
//! [`KeychainConfig`] selects the backend, the codec and the default
//! accessibility policy. Defaults come from the [`Default`] implementation;
//! callers can adjust fields with the `with_*` builder methods or load a TOML
//! file:
//!
//! ```toml
//! service = "com.example.app"
//! key_prefix = "prod."
//! default_access = "when_unlocked_this_device_only"
//! codec = "bincode"
//! backend = "file"
//! data_dir = "/var/lib/example/keychain"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::access::AccessibilityPolicy;
use crate::codec::CodecKind;
use crate::error::{KeychainError, KeychainResult};

/// Which [`SecureStore`](crate::backend::SecureStore) to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Best native keychain for the platform, falling back to the encrypted
    /// file store.
    #[default]
    Platform,
    /// Encrypted file store under `data_dir`.
    File,
    /// In-process store; nothing is persisted.
    Memory,
}

/// Configuration for [`platform_store`](crate::backend::platform_store) and
/// [`TypedSecureStore::from_config`](crate::TypedSecureStore::from_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeychainConfig {
    /// Keychain service name scoping every item.
    ///
    /// Default: **`codable-keychain`**.
    pub service: String,

    /// Prefix prepended to every key by the backend adapter.
    ///
    /// Default: **none**.
    pub key_prefix: Option<String>,

    /// Policy used by `set` when the caller does not pass one.
    ///
    /// Default: **`when_unlocked`**.
    pub default_access: AccessibilityPolicy,

    /// Codec used by `set`/`get` when the caller does not pass one.
    ///
    /// Default: **`json`**.
    pub codec: CodecKind,

    /// Backend selection.
    ///
    /// Default: **`platform`**.
    pub backend: BackendKind,

    /// Directory of the encrypted file store.
    ///
    /// Default: **`data/keychain`**.
    pub data_dir: PathBuf,
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            service: "codable-keychain".into(),
            key_prefix: None,
            default_access: AccessibilityPolicy::DEFAULT,
            codec: CodecKind::Json,
            backend: BackendKind::Platform,
            data_dir: PathBuf::from("data/keychain"),
        }
    }
}

impl KeychainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> KeychainResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> KeychainResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), backend = ?config.backend, "loaded keychain config");
        Ok(config)
    }

    /// Check values that the type system cannot.
    pub fn validate(&self) -> KeychainResult<()> {
        if self.service.trim().is_empty() {
            return Err(KeychainError::InvalidConfig {
                reason: "service must not be empty".into(),
            });
        }
        if self.key_prefix.as_deref() == Some("") {
            return Err(KeychainError::InvalidConfig {
                reason: "key_prefix must be omitted rather than empty".into(),
            });
        }
        if self.backend == BackendKind::File && self.data_dir.as_os_str().is_empty() {
            return Err(KeychainError::InvalidConfig {
                reason: "data_dir is required for the file backend".into(),
            });
        }
        Ok(())
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_default_access(mut self, access: AccessibilityPolicy) -> Self {
        self.default_access = access;
        self
    }

    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}
