//! AES-256-GCM sealing and PBKDF2 key derivation using `ring`.
//!
//! Used by the file-backed store. Every item is sealed with a fresh random
//! 96-bit nonce; callers pass associated data that binds the ciphertext to
//! the item's key and accessibility tag so files cannot be swapped or
//! relabelled on disk.

use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, SealingKey, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{KeychainError, KeychainResult};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// PBKDF2-HMAC-SHA256 iteration count (OWASP 2023).
const PBKDF2_ITERATIONS: std::num::NonZeroU32 = match std::num::NonZeroU32::new(600_000) {
    Some(n) => n,
    None => unreachable!(),
};

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

/// Yields exactly one nonce, so a sealing key can never be reused.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

fn check_key_len(key: &[u8]) -> std::result::Result<(), String> {
    if key.len() == KEY_LEN {
        Ok(())
    } else {
        Err(format!("key must be {} bytes, got {}", KEY_LEN, key.len()))
    }
}

/// Seal `plaintext` under `key`, authenticating `aad` alongside it.
///
/// Returns `(nonce, ciphertext || tag)`.
pub fn seal(
    plaintext: &[u8],
    key: &[u8],
    aad: &[u8],
) -> KeychainResult<([u8; NONCE_LEN_BYTES], Vec<u8>)> {
    check_key_len(key).map_err(|reason| KeychainError::EncryptionFailed { reason })?;

    let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| KeychainError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| KeychainError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce(Some(nonce_bytes)));

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::from(aad), &mut in_out)
        .map_err(|_| KeychainError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "sealed item"
    );
    Ok((nonce_bytes, in_out))
}

/// Open a ciphertext produced by [`seal`] with the same `key` and `aad`.
pub fn open(
    nonce: &[u8; NONCE_LEN_BYTES],
    ciphertext: &[u8],
    key: &[u8],
    aad: &[u8],
) -> KeychainResult<Vec<u8>> {
    check_key_len(key).map_err(|reason| KeychainError::DecryptionFailed { reason })?;

    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| KeychainError::DecryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut opening_key = aead::OpeningKey::new(unbound, SingleNonce(Some(*nonce)));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::from(aad), &mut in_out)
        .map_err(|_| KeychainError::DecryptionFailed {
            reason: "authentication failed: wrong key or corrupted item".into(),
        })?;

    Ok(plaintext.to_vec())
}

/// Derive a 256-bit key from `material` and `salt` with PBKDF2-HMAC-SHA256.
pub fn derive_key(material: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::derive(PBKDF2_ALG, PBKDF2_ITERATIONS, salt, material, &mut out);
    out
}

/// Generate `len` bytes from the system CSPRNG.
pub fn random_bytes(len: usize) -> KeychainResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| KeychainError::EncryptionFailed {
            reason: "failed to generate random bytes".into(),
        })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = random_bytes(KEY_LEN).unwrap();
        let (nonce, ct) = seal(b"{\"name\":\"Ann\"}", &key, b"u1").unwrap();
        assert_eq!(ct.len(), 14 + TAG_LEN);
        let pt = open(&nonce, &ct, &key, b"u1").unwrap();
        assert_eq!(pt, b"{\"name\":\"Ann\"}");
    }

    #[test]
    fn open_with_other_aad_fails() {
        let key = random_bytes(KEY_LEN).unwrap();
        let (nonce, ct) = seal(b"secret", &key, b"u1").unwrap();
        let result = open(&nonce, &ct, &key, b"u2");
        assert!(matches!(result, Err(KeychainError::DecryptionFailed { .. })));
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let key1 = random_bytes(KEY_LEN).unwrap();
        let key2 = random_bytes(KEY_LEN).unwrap();
        let (nonce, ct) = seal(b"secret", &key1, b"").unwrap();
        assert!(open(&nonce, &ct, &key2, b"").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = random_bytes(KEY_LEN).unwrap();
        let (nonce, mut ct) = seal(b"secret", &key, b"").unwrap();
        ct[0] ^= 0x01;
        assert!(open(&nonce, &ct, &key, b"").is_err());
    }

    #[test]
    fn short_key_rejected() {
        let result = seal(b"x", &[0u8; 16], b"");
        assert!(matches!(result, Err(KeychainError::EncryptionFailed { .. })));
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = random_bytes(KEY_LEN).unwrap();
        let (nonce, ct) = seal(b"", &key, b"k").unwrap();
        assert_eq!(ct.len(), TAG_LEN);
        assert!(open(&nonce, &ct, &key, b"k").unwrap().is_empty());
    }

    #[test]
    fn derive_key_is_deterministic() {
        let a = derive_key(b"host-user", b"salt");
        let b = derive_key(b"host-user", b"salt");
        let c = derive_key(b"host-user", b"pepper");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
