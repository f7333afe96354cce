//! Request Statistics
//!
//! Counters kept by one facade over its lifetime.

use std::time::Duration;

use serde::Serialize;

// == Request Stats ==
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RequestStats {
    /// Reads answered from the local memo
    pub local_hits: u64,
    /// Reads answered by a remote server
    pub remote_hits: u64,
    /// Reads that found nothing in either tier
    pub misses: u64,
    /// Calls made to remote servers, replica reads and writes included
    pub remote_calls: u64,
    /// Time spent waiting on remote servers, in microseconds
    pub remote_time_us: u64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.local_hits + self.remote_hits
    }

    /// Returns hits / reads, or 0.0 before any read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    pub fn record_local_hit(&mut self) {
        self.local_hits += 1;
    }

    pub fn record_remote_hit(&mut self) {
        self.remote_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_remote(&mut self, calls: usize, elapsed: Duration) {
        self.remote_calls += calls as u64;
        self.remote_time_us += u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    }
}
