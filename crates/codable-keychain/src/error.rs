//! Error types.
//!
//! Two error enums live here:
//!
//! - [`CodableKeychainError`] is the taxonomy returned by the typed store
//!   operations. It only ever reports codec failures; backend failures are
//!   reported through the boolean returned by `set`/`delete`.
//! - [`KeychainError`] covers configuration and adapter-internal failures.
//!   Adapters log these and collapse them into the boolean/`Option` channel at
//!   the [`SecureStore`](crate::backend::SecureStore) boundary.

/// Failure of a typed `set` or `get`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodableKeychainError {
    /// The codec rejected the value handed to `set`. Nothing was written.
    #[error("encoding failed: {reason}")]
    EncodingFailed { reason: String },

    /// Bytes were found for the key but the codec could not turn them into
    /// the requested type.
    #[error("decoding failed: {reason}")]
    DecodingFailed { reason: String },
}

impl CodableKeychainError {
    /// The codec's own description of the failure.
    pub fn reason(&self) -> &str {
        match self {
            Self::EncodingFailed { reason } | Self::DecodingFailed { reason } => reason,
        }
    }
}

/// Configuration and backend errors.
#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    // -- Crypto errors ------------------------------------------------------
    /// Sealing an item failed (bad key length, RNG failure).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Opening an item failed (wrong key, corrupted or tampered file).
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    // -- Backend errors -----------------------------------------------------
    /// The platform keychain rejected the request or is not reachable.
    #[error("keychain unavailable: {reason}")]
    KeychainUnavailable { reason: String },

    /// A stored item does not have the expected on-disk layout.
    #[error("corrupted item: {reason}")]
    CorruptedItem { reason: String },

    // -- Configuration errors -----------------------------------------------
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The configuration file is not valid TOML for [`KeychainConfig`](crate::config::KeychainConfig).
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // -- Underlying errors --------------------------------------------------
    /// I/O error from the filesystem.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a typed store operation.
pub type Result<T> = std::result::Result<T, CodableKeychainError>;

/// Result of a configuration or adapter-internal operation.
pub type KeychainResult<T> = std::result::Result<T, KeychainError>;
