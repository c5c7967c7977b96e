//! Value <-> byte codecs.
//!
//! A [`Codec`] turns any `serde` value into bytes and back. The typed store
//! only needs the two operations and a printable error, so any format with a
//! serde implementation can be plugged in.
//!
//! - [`JsonCodec`] — compact JSON via `serde_json` (the default).
//! - [`BincodeCodec`] — compact binary via `bincode`.
//! - [`CodecKind`] — runtime-selected codec, used by configuration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Converts typed values to bytes and back.
pub trait Codec: Send + Sync {
    /// Failure type; its `Display` output ends up in
    /// [`CodableKeychainError`](crate::CodableKeychainError) values.
    type Error: std::error::Error;

    /// Encode `value` into a byte vector.
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + ?Sized;

    /// Decode `bytes` into a `T`.
    fn decode<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;
}

impl<C: Codec + ?Sized> Codec for &C {
    type Error = C::Error;

    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        (**self).encode(value)
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        (**self).decode(bytes)
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    type Error = serde_json::Error;

    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value)
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes)
    }
}

// ---------------------------------------------------------------------------
// bincode
// ---------------------------------------------------------------------------

/// Binary codec backed by `bincode`.
///
/// Not self-describing: decoding succeeds only when the requested type has
/// the same layout as the encoded one. Trailing bytes are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    type Error = bincode::Error;

    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        bincode::serialize(value)
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        use bincode::Options;

        // `bincode::deserialize` tolerates trailing bytes; keep the same
        // fixint encoding as `serialize` but reject leftovers.
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
            .deserialize(bytes)
    }
}

// ---------------------------------------------------------------------------
// Runtime selection
// ---------------------------------------------------------------------------

/// Error from a [`CodecKind`]; carries the selected codec's description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{codec}: {message}")]
pub struct CodecError {
    pub codec: CodecKind,
    pub message: String,
}

/// Codec chosen at runtime, e.g. from a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Json,
    Bincode,
}

impl CodecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bincode => "bincode",
        }
    }

    fn error(&self, err: impl std::fmt::Display) -> CodecError {
        CodecError {
            codec: *self,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Codec for CodecKind {
    type Error = CodecError;

    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        match self {
            Self::Json => JsonCodec::new().encode(value).map_err(|e| self.error(e)),
            Self::Bincode => BincodeCodec.encode(value).map_err(|e| self.error(e)),
        }
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        match self {
            Self::Json => JsonCodec::new().decode(bytes).map_err(|e| self.error(e)),
            Self::Bincode => BincodeCodec.decode(bytes).map_err(|e| self.error(e)),
        }
    }
}
