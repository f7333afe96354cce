//! Memory Node Module
//!
//! An in-process cache server with memcached semantics: TTL expiration, LRU
//! eviction, conditional stores and atomic counters. Nodes implement
//! [`CacheBackend`] so the remote client can pool them like real servers.

mod entry;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::remote::CacheBackend;

pub use entry::{current_timestamp_ms, StoredItem, RELATIVE_EXPIRATION_LIMIT};
pub use lru::LruTracker;
pub use stats::NodeStats;
pub use store::NodeStore;

// == Public Constants ==
/// Maximum allowed key length in bytes (memcached limit)
pub const MAX_KEY_LENGTH: usize = 250;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

// == Memory Node ==
/// A named cache server living in this process.
///
/// `set_available(false)` makes every call fail with `RemoteUnavailable`,
/// which is how tests model a server that stopped answering.
#[derive(Debug)]
pub struct MemoryNode {
    name: String,
    store: Mutex<NodeStore>,
    available: AtomicBool,
    calls: AtomicU64,
}

impl MemoryNode {
    /// Creates a node holding at most `max_entries` items.
    pub fn new(name: impl Into<String>, max_entries: usize) -> Self {
        Self {
            name: name.into(),
            store: Mutex::new(NodeStore::new(max_entries)),
            available: AtomicBool::new(true),
            calls: AtomicU64::new(0),
        }
    }

    /// Switches the node between answering and unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of backend calls this node has received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> NodeStats {
        self.store.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Removes expired items, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        self.store.lock().cleanup_expired()
    }

    /// Drops every item on the node.
    pub fn flush_all(&self) {
        self.store.lock().flush_all();
    }

    /// Runs `op` against the store if the node is reachable.
    fn call<T>(&self, op: &str, f: impl FnOnce(&mut NodeStore) -> Result<T>) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_available() {
            debug!(node = %self.name, op, "node unavailable");
            return Err(CacheError::RemoteUnavailable(self.name.clone()));
        }
        let mut store = self.store.lock();
        f(&mut store)
    }
}

impl CacheBackend for MemoryNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.call("get", |store| Ok(store.get(key)))
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        self.call("get_multi", |store| {
            Ok(keys
                .iter()
                .filter_map(|key| store.get(key).map(|value| (key.clone(), value)))
                .collect())
        })
    }

    fn set(&self, key: &str, value: Value, expire: u64) -> Result<()> {
        self.call("set", |store| store.set(key, value, expire))
    }

    fn add(&self, key: &str, value: Value, expire: u64) -> Result<()> {
        self.call("add", |store| store.add(key, value, expire))
    }

    fn replace(&self, key: &str, value: Value, expire: u64) -> Result<()> {
        self.call("replace", |store| store.replace(key, value, expire))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.call("delete", |store| store.delete(key))
    }

    fn incr(&self, key: &str, delta: u64) -> Result<u64> {
        self.call("incr", |store| store.incr(key, delta))
    }

    fn decr(&self, key: &str, delta: u64) -> Result<u64> {
        self.call("decr", |store| store.decr(key, delta))
    }
}
