//! Request-local memo of fully-qualified keys.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// A cached value plus whether the key really exists.
///
/// Misses carry `false` as their value so that a stored `false` can only be
/// told apart from a miss through `found`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub value: Value,
    pub found: bool,
}

impl CacheEntry {
    pub fn hit(value: Value) -> Self {
        Self { value, found: true }
    }

    pub fn miss() -> Self {
        Self {
            value: Value::Bool(false),
            found: false,
        }
    }

    /// An entry that holds a value but is not known to exist remotely.
    pub fn staged(value: Value) -> Self {
        Self {
            value,
            found: false,
        }
    }
}

/// Entries this process has read or written, keyed by fully-qualified key.
///
/// Lives as long as the facade that owns it; nothing here expires.
#[derive(Debug, Default)]
pub struct LocalMemo {
    entries: HashMap<String, CacheEntry>,
}

impl LocalMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    pub fn set(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Removes an entry, returning whether one was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
