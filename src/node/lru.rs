//! LRU Tracker Module
//!
//! Least Recently Used ordering for node eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Every touch stamps the key with a fresh sequence number; the smallest
/// live stamp is the least recently used key.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Key -> last access stamp
    stamps: HashMap<String, u64>,
    /// Access stamp -> key, oldest first
    order: BTreeMap<u64, String>,
    /// Next stamp to hand out
    clock: u64,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        self.clock += 1;
        if let Some(previous) = self.stamps.insert(key.to_string(), self.clock) {
            self.order.remove(&previous);
        }
        self.order.insert(self.clock, key.to_string());
    }

    /// Stops tracking a key.
    pub fn remove(&mut self, key: &str) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker_has_nothing_to_evict() {
        let mut tracker = LruTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.peek_oldest(), None);
        assert_eq!(tracker.evict_oldest(), None);
    }

    #[test]
    fn test_retouched_key_is_no_longer_oldest() {
        let mut tracker = LruTracker::new();
        for key in ["wp_:1:posts:a", "wp_:1:posts:b", "wp_:1:posts:c"] {
            tracker.touch(key);
        }
        tracker.touch("wp_:1:posts:a");

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.peek_oldest().map(String::as_str), Some("wp_:1:posts:b"));
    }

    #[test]
    fn test_eviction_follows_last_access() {
        let mut tracker = LruTracker::new();
        for key in ["x", "y", "z", "x", "z", "y"] {
            tracker.touch(key);
        }

        let evicted: Vec<String> = std::iter::from_fn(|| tracker.evict_oldest()).collect();
        assert_eq!(evicted, ["x", "z", "y"]);
    }

    #[test]
    fn test_removed_key_is_never_evicted() {
        let mut tracker = LruTracker::new();
        tracker.touch("gone");
        tracker.touch("kept");
        tracker.remove("gone");
        tracker.remove("never-tracked");

        assert!(!tracker.contains("gone"));
        assert_eq!(tracker.evict_oldest().as_deref(), Some("kept"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_repeated_touches_track_one_entry() {
        let mut tracker = LruTracker::new();
        (0..5).for_each(|_| tracker.touch("hot"));
        tracker.touch("cold");

        assert_eq!(tracker.len(), 2);
        tracker.clear();
        assert!(tracker.is_empty());
        assert!(!tracker.contains("hot"));
    }
}
