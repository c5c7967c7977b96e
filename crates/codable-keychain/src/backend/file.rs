//! Encrypted file-per-item store.
//!
//! Cross-platform fallback for systems without a native keychain. Each item
//! lives in its own file inside the store directory, named after the
//! SHA-256 digest of its key, and is sealed with AES-256-GCM.
//!
//! The sealing key is either supplied by the caller ([`FileStore::with_key`])
//! or derived on first use from machine-specific data (hostname, username)
//! and an application salt. A derived key binds the files to this machine
//! and user, which is the closest the fallback gets to a "this device only"
//! guarantee. Lock-state classes cannot be enforced by a plain file; the
//! policy is recorded and authenticated but otherwise advisory.
//!
//! Item file layout (binary):
//! ```text
//! [4 bytes: magic "CKI1"]
//! [1 byte:  accessibility tag]
//! [12 bytes: AES-256-GCM nonce]
//! [remaining: ciphertext + 16-byte tag]
//! ```
//!
//! The magic, the accessibility tag and the item key are authenticated as
//! associated data, so renaming or relabelling a file makes it unreadable.
//!
//! Each write goes to its own owner-only temporary file in the store
//! directory, which is then renamed over the item. Concurrent writers of the
//! same key never share a temporary file; the last rename wins and readers
//! always see a complete item.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::digest;

use super::SecureStore;
use crate::access::AccessibilityPolicy;
use crate::crypto;
use crate::error::{KeychainError, KeychainResult};

const MAGIC: &[u8; 4] = b"CKI1";

const HEADER_LEN: usize = MAGIC.len() + 1 + crypto::NONCE_LEN_BYTES;

const ITEM_EXT: &str = "item";

/// Application salt for the device-derived key. Changing it makes every
/// existing item unreadable.
const APP_SALT: &[u8] = b"codable-keychain-file-store-v1";

/// [`SecureStore`] keeping one encrypted file per item.
pub struct FileStore {
    dir: PathBuf,
    key: OnceLock<[u8; crypto::KEY_LEN]>,
    device_bound: bool,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("key", &"<redacted>")
            .field("device_bound", &self.device_bound)
            .finish()
    }
}

impl FileStore {
    /// Open (creating if needed) a store in `dir` with a device-derived key.
    pub fn open(dir: impl Into<PathBuf>) -> KeychainResult<Self> {
        let store = Self {
            dir: dir.into(),
            key: OnceLock::new(),
            device_bound: true,
        };
        store.ensure_dir()?;
        Ok(store)
    }

    /// Open a store in `dir` sealed with an explicit 256-bit `key`.
    pub fn with_key(dir: impl Into<PathBuf>, key: &[u8]) -> KeychainResult<Self> {
        let key = <[u8; crypto::KEY_LEN]>::try_from(key).map_err(|_| KeychainError::InvalidConfig {
            reason: format!(
                "file store key must be {} bytes, got {}",
                crypto::KEY_LEN,
                key.len()
            ),
        })?;
        let store = Self {
            dir: dir.into(),
            key: OnceLock::from(key),
            device_bound: false,
        };
        store.ensure_dir()?;
        Ok(store)
    }

    /// Directory holding the item files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove every item in the store. Returns the number of items removed.
    pub fn clear(&self) -> KeychainResult<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == ITEM_EXT) {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        tracing::info!(dir = %self.dir.display(), removed, "cleared file store");
        Ok(removed)
    }

    fn ensure_dir(&self) -> KeychainResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    fn item_path(&self, key: &str) -> PathBuf {
        let hash = digest::digest(&digest::SHA256, key.as_bytes());
        self.dir
            .join(format!("{}.{ITEM_EXT}", URL_SAFE_NO_PAD.encode(hash.as_ref())))
    }

    fn sealing_key(&self) -> &[u8; crypto::KEY_LEN] {
        self.key.get_or_init(|| {
            tracing::debug!("deriving device key for file store");
            device_derived_key()
        })
    }

    fn aad(key: &str, tag: u8) -> Vec<u8> {
        let mut aad = Vec::with_capacity(MAGIC.len() + 1 + key.len());
        aad.extend_from_slice(MAGIC);
        aad.push(tag);
        aad.extend_from_slice(key.as_bytes());
        aad
    }

    fn write_item(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> KeychainResult<()> {
        if access.requires_unlock() {
            tracing::debug!(key = %key, access = %access, "lock state is not enforced by the file store");
        }
        if !access.migrates() && !self.device_bound {
            tracing::debug!(
                key = %key,
                access = %access,
                "item is sealed with a caller-supplied key and is not bound to this device"
            );
        }

        let tag = access.tag();
        let (nonce, ciphertext) = crypto::seal(bytes, self.sealing_key(), &Self::aad(key, tag))?;

        let mut data = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        data.extend_from_slice(MAGIC);
        data.push(tag);
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&ciphertext);

        // Dropping the temp file on any error path removes it.
        let mut builder = tempfile::Builder::new();
        builder.prefix(".").suffix(".tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o600));
        }
        let mut tmp = builder.tempfile_in(&self.dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.item_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn read_item(&self, key: &str) -> KeychainResult<Option<Vec<u8>>> {
        let data = match std::fs::read(self.item_path(key)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if data.len() < HEADER_LEN + crypto::TAG_LEN || !data.starts_with(MAGIC) {
            return Err(KeychainError::CorruptedItem {
                reason: "item file is truncated or has an unknown format".into(),
            });
        }

        let tag = data[MAGIC.len()];
        if AccessibilityPolicy::from_tag(tag).is_none() {
            return Err(KeychainError::CorruptedItem {
                reason: format!("unknown accessibility tag {tag}"),
            });
        }

        let (nonce_bytes, ciphertext) = data[MAGIC.len() + 1..].split_at(crypto::NONCE_LEN_BYTES);
        let mut nonce = [0u8; crypto::NONCE_LEN_BYTES];
        nonce.copy_from_slice(nonce_bytes);

        let plaintext = crypto::open(&nonce, ciphertext, self.sealing_key(), &Self::aad(key, tag))?;
        Ok(Some(plaintext))
    }

    fn remove_item(&self, key: &str) -> KeychainResult<()> {
        match std::fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SecureStore for FileStore {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        match self.write_item(key, bytes, access) {
            Ok(()) => {
                tracing::debug!(key = %key, bytes = bytes.len(), access = %access, "stored item in file store");
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "file store write failed");
                false
            }
        }
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.read_item(key) {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "file store read failed");
                None
            }
        }
    }

    fn delete_key(&self, key: &str) -> bool {
        match self.remove_item(key) {
            Ok(()) => {
                tracing::debug!(key = %key, "deleted item from file store");
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "file store delete failed");
                false
            }
        }
    }
}

/// Derive the sealing key from hostname, username and [`APP_SALT`].
fn device_derived_key() -> [u8; crypto::KEY_LEN] {
    let hostname = hostname();
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".into());

    let mut material = Vec::with_capacity(hostname.len() + 1 + username.len());
    material.extend_from_slice(hostname.as_bytes());
    material.push(0);
    material.extend_from_slice(username.as_bytes());

    crypto::derive_key(&material, APP_SALT)
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        std::fs::read_to_string("/etc/hostname")
            .map(|s| s.trim().to_string())
            .or_else(|_| std::env::var("HOSTNAME"))
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "unknown-host".into())
    }

    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "unknown-host".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let key = crypto::random_bytes(crypto::KEY_LEN).unwrap();
        let store = FileStore::with_key(dir.path().join("items"), &key).unwrap();
        (dir, store)
    }

    fn item_files(store: &FileStore) -> Vec<PathBuf> {
        std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[test]
    fn roundtrip_item() {
        let (_dir, store) = test_store();
        assert!(store.set_bytes("u1", b"{\"name\":\"Ann\"}", AccessibilityPolicy::WhenUnlocked));
        assert_eq!(store.get_bytes("u1"), Some(b"{\"name\":\"Ann\"}".to_vec()));
    }

    #[test]
    fn missing_item_is_none() {
        let (_dir, store) = test_store();
        assert_eq!(store.get_bytes("nope"), None);
    }

    #[test]
    fn overwrite_item() {
        let (_dir, store) = test_store();
        store.set_bytes("k", b"one", AccessibilityPolicy::WhenUnlocked);
        store.set_bytes("k", b"two", AccessibilityPolicy::Always);
        assert_eq!(store.get_bytes("k"), Some(b"two".to_vec()));
        assert_eq!(item_files(&store).len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = test_store();
        store.set_bytes("k", b"v", AccessibilityPolicy::DEFAULT);
        assert!(store.delete_key("k"));
        assert_eq!(store.get_bytes("k"), None);
        assert!(store.delete_key("k"));
    }

    #[test]
    fn file_does_not_contain_plaintext_or_key() {
        let (_dir, store) = test_store();
        store.set_bytes("api-token", b"sk-very-secret", AccessibilityPolicy::DEFAULT);

        let files = item_files(&store);
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.contains("api-token"));

        let raw = std::fs::read(&files[0]).unwrap();
        assert!(raw.starts_with(MAGIC));
        assert!(!raw.windows(14).any(|w| w == b"sk-very-secret"));
    }

    #[test]
    fn policy_tag_is_authenticated() {
        let (_dir, store) = test_store();
        store.set_bytes("k", b"v", AccessibilityPolicy::WhenUnlockedThisDeviceOnly);

        let path = store.item_path("k");
        let mut raw = std::fs::read(&path).unwrap();
        assert_eq!(raw[MAGIC.len()], AccessibilityPolicy::WhenUnlockedThisDeviceOnly.tag());
        raw[MAGIC.len()] = AccessibilityPolicy::Always.tag();
        std::fs::write(&path, &raw).unwrap();

        assert_eq!(store.get_bytes("k"), None);
    }

    #[test]
    fn swapped_files_are_rejected() {
        let (_dir, store) = test_store();
        store.set_bytes("a", b"alpha", AccessibilityPolicy::DEFAULT);
        store.set_bytes("b", b"beta", AccessibilityPolicy::DEFAULT);

        std::fs::copy(store.item_path("a"), store.item_path("b")).unwrap();
        assert_eq!(store.get_bytes("b"), None);
        assert_eq!(store.get_bytes("a"), Some(b"alpha".to_vec()));
    }

    #[test]
    fn truncated_file_reads_as_none() {
        let (_dir, store) = test_store();
        store.set_bytes("k", b"value", AccessibilityPolicy::DEFAULT);
        std::fs::write(store.item_path("k"), b"CKI1").unwrap();
        assert_eq!(store.get_bytes("k"), None);
        assert!(matches!(
            store.read_item("k"),
            Err(KeychainError::CorruptedItem { .. })
        ));
    }

    #[test]
    fn other_key_cannot_read() {
        let dir = tempfile::tempdir().unwrap();
        let k1 = crypto::random_bytes(crypto::KEY_LEN).unwrap();
        let k2 = crypto::random_bytes(crypto::KEY_LEN).unwrap();

        let writer = FileStore::with_key(dir.path(), &k1).unwrap();
        writer.set_bytes("k", b"v", AccessibilityPolicy::DEFAULT);

        let reader = FileStore::with_key(dir.path(), &k2).unwrap();
        assert_eq!(reader.get_bytes("k"), None);

        let same = FileStore::with_key(dir.path(), &k1).unwrap();
        assert_eq!(same.get_bytes("k"), Some(b"v".to_vec()));
    }

    #[test]
    fn wrong_key_length_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileStore::with_key(dir.path(), &[0u8; 16]);
        assert!(matches!(result, Err(KeychainError::InvalidConfig { .. })));
    }

    #[test]
    fn every_policy_is_stored_with_caller_key() {
        let (_dir, store) = test_store();
        assert!(!store.device_bound);
        for access in AccessibilityPolicy::ALL {
            assert!(store.set_bytes(access.as_str(), b"v", access));
            assert_eq!(store.get_bytes(access.as_str()), Some(b"v".to_vec()));
        }
        assert_eq!(item_files(&store).len(), AccessibilityPolicy::ALL.len());
    }

    #[test]
    fn concurrent_writes_to_one_key() {
        let (_dir, store) = test_store();
        let store = std::sync::Arc::new(store);
        store.set_bytes("k", &[0u8; 4096], AccessibilityPolicy::DEFAULT);

        let writers: Vec<_> = (0..4u8)
            .map(|t| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|_| !store.set_bytes("k", &[t; 4096], AccessibilityPolicy::DEFAULT))
                        .count()
                })
            })
            .collect();
        let reader = {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let bytes = store.get_bytes("k").expect("item vanished during overwrite");
                    assert_eq!(bytes.len(), 4096);
                    assert!(bytes.iter().all(|b| *b == bytes[0]));
                }
            })
        };

        let failed: usize = writers.into_iter().map(|h| h.join().unwrap()).sum();
        reader.join().unwrap();
        assert_eq!(failed, 0);

        let files = item_files(&store);
        assert_eq!(files.len(), 1);
        assert!(files[0].extension().is_some_and(|ext| ext == ITEM_EXT));
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let (_dir, store) = test_store();
        let blocker = store.item_path("k");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("occupied"), b"x").unwrap();

        assert!(!store.set_bytes("k", b"v", AccessibilityPolicy::DEFAULT));
        let files = item_files(&store);
        assert_eq!(files, vec![blocker]);
    }

    #[test]
    fn clear_removes_items() {
        let (_dir, store) = test_store();
        for key in ["a", "b", "c"] {
            store.set_bytes(key, b"v", AccessibilityPolicy::DEFAULT);
        }
        assert_eq!(store.clear().unwrap(), 3);
        assert!(item_files(&store).is_empty());
        assert_eq!(store.get_bytes("a"), None);
    }

    #[cfg(unix)]
    #[test]
    fn item_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = test_store();
        store.set_bytes("k", b"v", AccessibilityPolicy::DEFAULT);
        let mode = std::fs::metadata(store.item_path("k")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    #[ignore = "derives the device key with 600k PBKDF2 iterations; slow in debug builds"]
    fn device_key_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.set_bytes("k", b"v", AccessibilityPolicy::DEFAULT));

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_bytes("k"), Some(b"v".to_vec()));
    }
}
