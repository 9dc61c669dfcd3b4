//! Concurrent in-memory key-value store.

use std::collections::HashMap;

use parking_lot::RwLock;

/// String-to-string map shared by every request handler.
///
/// Reads (`get`, `keys`) share the lock; writes (`set`, `del`) take it
/// exclusively. Nothing is persisted.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<String, String>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`, returning the previous value if any.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.data.write().insert(key.into(), value.into())
    }

    /// Look up `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    /// Remove `key`. Returns whether it was present.
    pub fn del(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// Snapshot of all keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}
