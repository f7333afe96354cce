//! Node Statistics Module
//!
//! Per-node counters in the spirit of memcached's `stats` command.

use serde::Serialize;

// == Node Stats ==
/// Counters for one memory node.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct NodeStats {
    /// Reads that found a live item
    pub get_hits: u64,
    /// Reads that found nothing or an expired item
    pub get_misses: u64,
    /// Successful stores (set, add, replace, incr, decr)
    pub writes: u64,
    /// Items removed by LRU pressure
    pub evictions: u64,
    /// Items removed because their expiration passed
    pub expirations: u64,
    /// Current number of items
    pub curr_items: usize,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 before any read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.get_hits + self.get_misses;
        if total == 0 {
            0.0
        } else {
            self.get_hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.get_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.get_misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn set_curr_items(&mut self, count: usize) {
        self.curr_items = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = NodeStats::new();
        assert_eq!(stats, NodeStats::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = NodeStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_record_counters() {
        let mut stats = NodeStats::new();
        stats.record_write();
        stats.record_eviction();
        stats.record_expirations(3);
        stats.set_curr_items(42);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.curr_items, 42);
    }
}
