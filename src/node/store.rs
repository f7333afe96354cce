//! Node Store Module
//!
//! Storage engine of a memory node: HashMap items with LRU tracking, lazy TTL
//! expiration and memcached storage commands.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{CacheError, Result};
use crate::node::{LruTracker, NodeStats, StoredItem, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::value::{data_size, decremented, incremented};

// == Node Store ==
/// Item storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct NodeStore {
    /// Key-value storage
    items: HashMap<String, StoredItem>,
    /// LRU access tracker
    lru: LruTracker,
    /// Node counters
    stats: NodeStats,
    /// Maximum number of items before eviction kicks in
    max_entries: usize,
}

impl NodeStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` items.
    pub fn new(max_entries: usize) -> Self {
        Self {
            items: HashMap::new(),
            lru: LruTracker::new(),
            stats: NodeStats::new(),
            max_entries: max_entries.max(1),
        }
    }

    // == Get ==
    /// Retrieves a live item's value. Expired items are dropped and count as misses.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        match self.live(key) {
            Some(item) => {
                let value = item.value.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores a value unconditionally, resetting its expiration.
    ///
    /// If the store is at capacity, the least recently used item is evicted.
    pub fn set(&mut self, key: &str, value: Value, expire: u64) -> Result<()> {
        Self::validate(key, &value)?;

        if !self.items.contains_key(key) && self.items.len() >= self.max_entries {
            self.evict_one()?;
        }

        self.items
            .insert(key.to_string(), StoredItem::new(value, expire));
        self.lru.touch(key);
        self.stats.record_write();
        self.stats.set_curr_items(self.items.len());
        Ok(())
    }

    // == Add ==
    /// Stores a value only if no live item exists under `key`.
    pub fn add(&mut self, key: &str, value: Value, expire: u64) -> Result<()> {
        Self::validate(key, &value)?;
        if self.live(key).is_some() {
            return Err(CacheError::NotStored(key.to_string()));
        }
        self.set(key, value, expire)
    }

    // == Replace ==
    /// Stores a value only if a live item exists under `key`.
    pub fn replace(&mut self, key: &str, value: Value, expire: u64) -> Result<()> {
        Self::validate(key, &value)?;
        if self.live(key).is_none() {
            return Err(CacheError::NotFound(key.to_string()));
        }
        self.set(key, value, expire)
    }

    // == Delete ==
    /// Removes an item by key.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        if self.live(key).is_none() {
            return Err(CacheError::NotFound(key.to_string()));
        }
        self.items.remove(key);
        self.lru.remove(key);
        self.stats.set_curr_items(self.items.len());
        Ok(())
    }

    // == Incr / Decr ==
    /// Increments a numeric item in place, keeping its expiration.
    pub fn incr(&mut self, key: &str, delta: u64) -> Result<u64> {
        self.mutate_counter(key, |value| incremented(value, delta))
    }

    /// Decrements a numeric item in place, flooring at zero.
    pub fn decr(&mut self, key: &str, delta: u64) -> Result<u64> {
        self.mutate_counter(key, |value| decremented(value, delta))
    }

    fn mutate_counter(
        &mut self,
        key: &str,
        apply: impl FnOnce(&Value) -> Option<u64>,
    ) -> Result<u64> {
        let item = self
            .live(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        let next = apply(&item.value).ok_or_else(|| {
            CacheError::TypeMismatch(format!("cannot increment or decrement non-numeric value of {key}"))
        })?;
        item.value = Value::from(next);
        self.lru.touch(key);
        self.stats.record_write();
        Ok(next)
    }

    // == Stats ==
    /// Returns current node statistics.
    pub fn stats(&self) -> NodeStats {
        let mut stats = self.stats.clone();
        stats.set_curr_items(self.items.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired items and returns how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .items
            .iter()
            .filter(|(_, item)| item.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.items.remove(key);
            self.lru.remove(key);
        }

        self.stats.record_expirations(expired.len());
        self.stats.set_curr_items(self.items.len());
        expired.len()
    }

    /// Drops every item.
    pub fn flush_all(&mut self) {
        self.items.clear();
        self.lru.clear();
        self.stats.set_curr_items(0);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the live item under `key`, dropping it first if it expired.
    fn live(&mut self, key: &str) -> Option<&mut StoredItem> {
        if self.items.get(key).is_some_and(StoredItem::is_expired) {
            self.items.remove(key);
            self.lru.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_curr_items(self.items.len());
        }
        self.items.get_mut(key)
    }

    fn evict_one(&mut self) -> Result<()> {
        let evicted = self
            .lru
            .evict_oldest()
            .ok_or_else(|| CacheError::Internal("store is full and eviction failed".to_string()))?;
        self.items.remove(&evicted);
        self.stats.record_eviction();
        Ok(())
    }

    fn validate(key: &str, value: &Value) -> Result<()> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key must be 1 to {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            return Err(CacheError::InvalidRequest(
                "Key contains whitespace or control characters".to_string(),
            ));
        }
        if data_size(value) > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }
        Ok(())
    }
}
