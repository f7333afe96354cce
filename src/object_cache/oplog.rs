//! Operation Log
//!
//! A bounded per-group record of cache operations, kept for auditing flush
//! history and flush-number replication.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Entries kept per group before the oldest are dropped.
pub const MAX_ENTRIES_PER_GROUP: usize = 1024;

/// Kind of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Get,
    GetLocal,
    GetMultiple,
    Set,
    SetLocal,
    Add,
    Replace,
    Delete,
    DeleteLocal,
    DeleteMultiple,
    Increment,
    Decrement,
    GetFlushNumber,
    SetFlushNumber,
    Flush,
}

/// One logged operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationLogEntry {
    pub op: Op,
    pub group: String,
    pub keys: Vec<String>,
    pub value: Option<Value>,
    pub size: Option<usize>,
    pub elapsed_us: Option<u64>,
    /// Short annotation such as `memcache`, `not_in_local` or
    /// `replication_repair`.
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl OperationLogEntry {
    pub fn new(op: Op, group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            op,
            group: group.into(),
            keys: vec![key.into()],
            value: None,
            size: None,
            elapsed_us: None,
            reason: String::new(),
            at: Utc::now(),
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_us = Some(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

#[derive(Debug, Default)]
pub struct OperationLog {
    groups: HashMap<String, VecDeque<OperationLogEntry>>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: OperationLogEntry) {
        let log = self.groups.entry(entry.group.clone()).or_default();
        if log.len() == MAX_ENTRIES_PER_GROUP {
            log.pop_front();
        }
        log.push_back(entry);
    }

    /// Entries of `group`, oldest first.
    pub fn entries(&self, group: &str) -> Vec<&OperationLogEntry> {
        self.groups
            .get(group)
            .map(|log| log.iter().collect())
            .unwrap_or_default()
    }

    /// Number of entries of `group` matching `op` and, if given, `reason`.
    pub fn count(&self, group: &str, op: Op, reason: Option<&str>) -> usize {
        self.entries(group)
            .into_iter()
            .filter(|entry| entry.op == op && reason.map_or(true, |r| entry.reason == r))
            .count()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}
