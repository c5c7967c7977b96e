//! In-process secure store.
//!
//! Nothing leaves the process and nothing survives it. Useful for tests and
//! for ephemeral sessions. The store remembers the accessibility policy each
//! item was written with and counts writes, so callers can assert on what the
//! typed layer asked the backend to do.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use super::SecureStore;
use crate::access::AccessibilityPolicy;

#[derive(Debug, Clone)]
struct Item {
    bytes: Vec<u8>,
    access: AccessibilityPolicy,
}

/// Concurrent in-memory [`SecureStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: DashMap<String, Item>,
    writes: AtomicUsize,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses every write and delete, like a keychain that is
    /// locked or denies access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Insert bytes directly, bypassing the write counter.
    pub fn seed(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>, access: AccessibilityPolicy) {
        self.items.insert(
            key.into(),
            Item {
                bytes: bytes.into(),
                access,
            },
        );
    }

    /// Accessibility policy the item under `key` was written with.
    pub fn access_of(&self, key: &str) -> Option<AccessibilityPolicy> {
        self.items.get(key).map(|item| item.access)
    }

    /// Number of accepted `set_bytes` calls since creation.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl SecureStore for MemoryStore {
    fn set_bytes(&self, key: &str, bytes: &[u8], access: AccessibilityPolicy) -> bool {
        if self.read_only {
            tracing::debug!(key = %key, "write refused by read-only memory store");
            return false;
        }
        self.items.insert(
            key.to_string(),
            Item {
                bytes: bytes.to_vec(),
                access,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(key = %key, bytes = bytes.len(), access = %access, "memory store write");
        true
    }

    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.items.get(key).map(|item| item.bytes.clone())
    }

    fn delete_key(&self, key: &str) -> bool {
        if self.read_only {
            tracing::debug!(key = %key, "delete refused by read-only memory store");
            return false;
        }
        self.items.remove(key);
        true
    }
}
