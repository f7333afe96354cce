//! Object Cache Facade
//!
//! The public cache API. Every call builds the fully-qualified key of its
//! group, consults the local memo and, for persistent groups, the remote
//! tier. Remote failures never reach the caller: reads degrade to a miss and
//! writes to `false` / `None`.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::CacheError;
use crate::object_cache::epoch::{FlushEpochStore, FlushScope, ReplicaWrite};
use crate::object_cache::groups::{
    group_name, is_flush_group, GroupRegistry, FLUSH_GROUP, FLUSH_KEY, GLOBAL_FLUSH_GROUP,
};
use crate::object_cache::keys::{versioned_prefix, KeyBuilder, UNVERSIONED_PREFIX};
use crate::object_cache::memo::{CacheEntry, LocalMemo};
use crate::object_cache::oplog::{Op, OperationLog, OperationLogEntry};
use crate::object_cache::stats::RequestStats;
use crate::remote::RemoteCacheClient;
use crate::site::SiteContext;
use crate::value::{data_size, decremented, incremented};

/// Optional operations this cache implements.
pub const SUPPORTED_FEATURES: [&str; 5] = [
    "add_multiple",
    "set_multiple",
    "get_multiple",
    "delete_multiple",
    "flush_runtime",
];

/// Thirty days, the longest relative expiration a server accepts.
pub const MAX_EXPIRATION: u64 = 2_592_000;

// == Expiration Policy ==
/// Maps a requested expiration to the one sent to servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    pub default_expiration: u64,
    pub max_expiration: u64,
}

impl ExpirationPolicy {
    /// Non-positive or over-long expirations fall back to the default.
    pub fn resolve(&self, expire: i64) -> u64 {
        match u64::try_from(expire) {
            Ok(expire) if expire > 0 && expire <= self.max_expiration => expire,
            _ => self.default_expiration,
        }
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self {
            default_expiration: 0,
            max_expiration: MAX_EXPIRATION,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Counter {
    Increment,
    Decrement,
}

impl Counter {
    fn op(self) -> Op {
        match self {
            Counter::Increment => Op::Increment,
            Counter::Decrement => Op::Decrement,
        }
    }
}

/// Group whose log records the flush number of `scope`.
fn bookkeeping_group(scope: &FlushScope) -> &'static str {
    match scope {
        FlushScope::Global => GLOBAL_FLUSH_GROUP,
        FlushScope::Site(_) => FLUSH_GROUP,
    }
}

fn miss_reason(err: &CacheError) -> &'static str {
    if err.is_unavailable() {
        "unavailable"
    } else {
        "not_in_memcache"
    }
}

// == Object Cache ==
/// One request's view of the cache.
///
/// Owns its memo, epoch cache and group registry; build one per request and
/// drop it at the end. The remote client is cheap to clone and shares its
/// servers between facades.
pub struct ObjectCache {
    remote: RemoteCacheClient,
    site: SiteContext,
    groups: GroupRegistry,
    keys: KeyBuilder,
    epochs: FlushEpochStore,
    memo: LocalMemo,
    oplog: OperationLog,
    expiration: ExpirationPolicy,
    stats: RequestStats,
}

impl ObjectCache {
    pub fn new(remote: RemoteCacheClient, site: SiteContext, salt: &str) -> Self {
        Self {
            remote,
            site,
            groups: GroupRegistry::new(),
            keys: KeyBuilder::new(salt),
            epochs: FlushEpochStore::new(),
            memo: LocalMemo::new(),
            oplog: OperationLog::new(),
            expiration: ExpirationPolicy::default(),
            stats: RequestStats::new(),
        }
    }

    /// Builds a facade with the site, salt, groups and expiration policy of
    /// `config`.
    pub fn from_config(config: &Config, remote: RemoteCacheClient) -> Self {
        let mut cache =
            Self::new(remote, config.site(), &config.key_salt).with_expiration(config.expiration());
        cache.add_global_groups(&config.global_groups);
        cache.add_non_persistent_groups(&config.non_persistent_groups);
        cache
    }

    pub fn with_expiration(mut self, expiration: ExpirationPolicy) -> Self {
        self.expiration = expiration;
        self
    }

    // == Keys ==

    /// Fully-qualified key of `raw_key` in `group`.
    pub fn key(&mut self, raw_key: &str, group: &str) -> String {
        let group = group_name(group);
        let prefix = if self.groups.is_global(group) {
            self.site.global_prefix()
        } else {
            self.site.site_prefix()
        };
        let flush_prefix = self.flush_prefix(group);
        self.keys.build(&prefix, &flush_prefix, group, raw_key)
    }

    /// Epoch part of the keys of `group`.
    ///
    /// The bookkeeping groups and non-persistent groups are unversioned: the
    /// former hold the epochs, the latter never leave the memo, which a flush
    /// clears anyway.
    pub fn flush_prefix(&mut self, group: &str) -> String {
        let group = group_name(group);
        if is_flush_group(group) || self.groups.is_non_persistent(group) {
            return UNVERSIONED_PREFIX.to_string();
        }
        let scope = self.scope_of(group);
        versioned_prefix(self.epoch(&scope))
    }

    fn scope_of(&self, group: &str) -> FlushScope {
        if self.groups.is_global(group) {
            FlushScope::Global
        } else {
            FlushScope::Site(self.site.site_prefix())
        }
    }

    fn bookkeeping_key(&self, scope: &FlushScope) -> String {
        match scope {
            FlushScope::Global => self.keys.build(
                &self.site.global_prefix(),
                UNVERSIONED_PREFIX,
                GLOBAL_FLUSH_GROUP,
                FLUSH_KEY,
            ),
            FlushScope::Site(prefix) => {
                self.keys
                    .build(prefix, UNVERSIONED_PREFIX, FLUSH_GROUP, FLUSH_KEY)
            }
        }
    }

    /// Current epoch of `scope`, resolved from the replicas on first use.
    pub fn epoch(&mut self, scope: &FlushScope) -> u64 {
        if let Some(epoch) = self.epochs.cached(scope).filter(|epoch| *epoch != 0) {
            return epoch;
        }

        let key = self.bookkeeping_key(scope);
        let start = Instant::now();
        let resolution = self.epochs.get_or_init(scope, &key, &self.remote);
        let elapsed = start.elapsed();

        self.stats.record_remote(
            self.remote.replica_count() + resolution.writes.len(),
            elapsed,
        );
        self.oplog.record(
            OperationLogEntry::new(Op::GetFlushNumber, bookkeeping_group(scope), &key)
                .with_value(Value::from(resolution.epoch))
                .with_elapsed(elapsed),
        );
        self.record_replica_writes(scope, &resolution.writes);
        resolution.epoch
    }

    fn record_replica_writes(&mut self, scope: &FlushScope, writes: &[ReplicaWrite]) {
        for write in writes {
            let value = Value::from(write.epoch);
            let mut reason = write.reason.as_str().to_string();
            if !write.ok {
                reason.push_str(" [failed]");
            }
            self.oplog.record(
                OperationLogEntry::new(Op::SetFlushNumber, bookkeeping_group(scope), &write.key)
                    .with_size(data_size(&value))
                    .with_value(value)
                    .with_reason(reason),
            );
        }
    }

    /// Runs one remote call, charging it to the stats.
    fn timed<T>(&mut self, call: impl FnOnce(&RemoteCacheClient) -> T) -> (T, Duration) {
        let start = Instant::now();
        let result = call(&self.remote);
        let elapsed = start.elapsed();
        self.stats.record_remote(1, elapsed);
        (result, elapsed)
    }

    // == Writes ==

    /// Stores `value` only if the key exists in neither tier.
    pub fn add(&mut self, key: &str, value: Value, group: &str, expire: i64) -> bool {
        let group = group_name(group);
        let fq = self.key(key, group);

        if self.groups.is_non_persistent(group) {
            if self.memo.contains(&fq) {
                return false;
            }
            self.oplog
                .record(OperationLogEntry::new(Op::Add, group, &fq).with_reason("local"));
            self.memo.set(fq, CacheEntry::staged(value));
            return true;
        }

        if self.memo.get(&fq).is_some_and(|entry| entry.found) {
            self.oplog
                .record(OperationLogEntry::new(Op::Add, group, &fq).with_reason("lc already"));
            return false;
        }

        let expire = self.expiration.resolve(expire);
        let size = data_size(&value);
        let (result, elapsed) = self.timed(|remote| remote.add(&fq, group, value.clone(), expire));

        let entry = OperationLogEntry::new(Op::Add, group, &fq)
            .with_size(size)
            .with_elapsed(elapsed);
        match result {
            Ok(()) => {
                debug!(key = %fq, "add stored");
                self.oplog.record(entry);
                self.memo.set(fq, CacheEntry::hit(value));
                true
            }
            Err(err) => {
                debug!(key = %fq, error = %err, "add refused");
                let reason = match err {
                    CacheError::NotStored(_) => "mc already",
                    _ => miss_reason(&err),
                };
                self.oplog.record(entry.with_reason(reason));
                self.memo.remove(&fq);
                false
            }
        }
    }

    /// Stores `value` unconditionally.
    ///
    /// The memo entry is marked found only once the remote write succeeded;
    /// non-persistent groups stage the value with `found = false`.
    pub fn set(&mut self, key: &str, value: Value, group: &str, expire: i64) -> bool {
        let group = group_name(group);
        let fq = self.key(key, group);

        if self.groups.is_non_persistent(group) {
            self.oplog.record(OperationLogEntry::new(Op::SetLocal, group, &fq));
            self.memo.set(fq, CacheEntry::staged(value));
            return true;
        }

        let expire = self.expiration.resolve(expire);
        let size = data_size(&value);
        let (result, elapsed) = self.timed(|remote| remote.set(&fq, group, value.clone(), expire));

        let mut entry = OperationLogEntry::new(Op::Set, group, &fq)
            .with_size(size)
            .with_elapsed(elapsed);
        if let Err(err) = &result {
            warn!(key = %fq, error = %err, "set failed");
            entry = entry.with_reason(miss_reason(err));
        }
        self.oplog.record(entry);
        self.memo.set(
            fq,
            CacheEntry {
                value,
                found: result.is_ok(),
            },
        );
        result.is_ok()
    }

    /// Stores `value` only if the key already exists.
    pub fn replace(&mut self, key: &str, value: Value, group: &str, expire: i64) -> bool {
        let group = group_name(group);
        let fq = self.key(key, group);

        if self.groups.is_non_persistent(group) {
            if !self.memo.contains(&fq) {
                return false;
            }
            self.oplog
                .record(OperationLogEntry::new(Op::Replace, group, &fq).with_reason("local"));
            self.memo.set(fq, CacheEntry::staged(value));
            return true;
        }

        let expire = self.expiration.resolve(expire);
        let size = data_size(&value);
        let (result, elapsed) =
            self.timed(|remote| remote.replace(&fq, group, value.clone(), expire));

        let entry = OperationLogEntry::new(Op::Replace, group, &fq)
            .with_size(size)
            .with_elapsed(elapsed);
        match result {
            Ok(()) => {
                self.oplog.record(entry);
                self.memo.set(fq, CacheEntry::hit(value));
                true
            }
            Err(err) => {
                debug!(key = %fq, error = %err, "replace refused");
                self.oplog.record(entry.with_reason(miss_reason(&err)));
                false
            }
        }
    }

    // == Reads ==

    /// Looks a key up, memo first unless `force` is set.
    ///
    /// Non-persistent groups only ever consult the memo.
    pub fn get(&mut self, key: &str, group: &str, force: bool) -> CacheEntry {
        let group = group_name(group);
        let fq = self.key(key, group);
        let non_persistent = self.groups.is_non_persistent(group);

        if let Some(entry) = self.memo.get(&fq).filter(|_| !force || non_persistent) {
            let entry = entry.clone();
            self.stats.record_local_hit();
            self.oplog
                .record(OperationLogEntry::new(Op::GetLocal, group, &fq).with_reason("local"));
            return entry;
        }

        if non_persistent {
            self.stats.record_miss();
            self.oplog.record(
                OperationLogEntry::new(Op::GetLocal, group, &fq).with_reason("not_in_local"),
            );
            return CacheEntry::miss();
        }

        let (result, elapsed) = self.timed(|remote| remote.get(&fq, group));
        let log = OperationLogEntry::new(Op::Get, group, &fq).with_elapsed(elapsed);
        let entry = match result {
            Ok(Some(value)) => {
                self.stats.record_remote_hit();
                self.oplog
                    .record(log.with_size(data_size(&value)).with_reason("memcache"));
                CacheEntry::hit(value)
            }
            Ok(None) => {
                self.stats.record_miss();
                self.oplog.record(log.with_reason("not_in_memcache"));
                CacheEntry::miss()
            }
            Err(err) => {
                warn!(key = %fq, error = %err, "get failed");
                self.stats.record_miss();
                self.oplog.record(log.with_reason(miss_reason(&err)));
                CacheEntry::miss()
            }
        };
        self.memo.set(fq, entry.clone());
        entry
    }

    // == Removal ==

    /// Removes a key from the memo and, for persistent groups, the servers.
    pub fn delete(&mut self, key: &str, group: &str) -> bool {
        let group = group_name(group);
        let fq = self.key(key, group);
        let existed = self.memo.remove(&fq);

        if self.groups.is_non_persistent(group) {
            self.oplog
                .record(OperationLogEntry::new(Op::DeleteLocal, group, &fq));
            return existed;
        }

        let (result, elapsed) = self.timed(|remote| remote.delete(&fq, group));
        let mut entry = OperationLogEntry::new(Op::Delete, group, &fq).with_elapsed(elapsed);
        if let Err(err) = &result {
            debug!(key = %fq, error = %err, "delete failed");
            entry = entry.with_reason(miss_reason(err));
        }
        self.oplog.record(entry);
        result.is_ok()
    }

    // == Counters ==

    /// Increments a numeric value, returning the new value.
    pub fn incr(&mut self, key: &str, offset: u64, group: &str) -> Option<u64> {
        self.apply_counter(key, offset, group, Counter::Increment)
    }

    /// Decrements a numeric value, flooring at zero.
    pub fn decr(&mut self, key: &str, offset: u64, group: &str) -> Option<u64> {
        self.apply_counter(key, offset, group, Counter::Decrement)
    }

    fn apply_counter(&mut self, key: &str, offset: u64, group: &str, counter: Counter) -> Option<u64> {
        let group = group_name(group);
        let fq = self.key(key, group);

        if self.groups.is_non_persistent(group) {
            let entry = self.memo.get_mut(&fq)?;
            let updated = match counter {
                Counter::Increment => incremented(&entry.value, offset),
                Counter::Decrement => decremented(&entry.value, offset),
            }?;
            entry.value = Value::from(updated);
            self.oplog.record(
                OperationLogEntry::new(counter.op(), group, &fq)
                    .with_value(Value::from(updated))
                    .with_reason("local"),
            );
            return Some(updated);
        }

        let (result, elapsed) = self.timed(|remote| match counter {
            Counter::Increment => remote.incr(&fq, group, offset),
            Counter::Decrement => remote.decr(&fq, group, offset),
        });
        let entry = OperationLogEntry::new(counter.op(), group, &fq).with_elapsed(elapsed);

        match result {
            Ok(updated) => {
                self.oplog.record(entry.with_value(Value::from(updated)));
                self.memo.set(fq, CacheEntry::hit(Value::from(updated)));
                Some(updated)
            }
            Err(err) => {
                debug!(key = %fq, error = %err, "counter update refused");
                self.oplog.record(entry.with_reason(miss_reason(&err)));
                None
            }
        }
    }

    // == Flush ==

    /// Invalidates every key of the current site, and of the global groups
    /// when running as the main site, by rotating their epochs.
    ///
    /// Returns true if the new site epoch reached at least one replica.
    pub fn flush(&mut self) -> bool {
        self.memo.clear();
        let epoch = self.epochs.mint();

        let site_scope = FlushScope::Site(self.site.site_prefix());
        let reached = self.rotate(&site_scope, epoch);
        if self.site.is_main_site() {
            self.rotate(&FlushScope::Global, epoch);
        }

        info!(epoch, site = %self.site.site_prefix(), reached, "flushed object cache");
        reached
    }

    fn rotate(&mut self, scope: &FlushScope, epoch: u64) -> bool {
        let key = self.bookkeeping_key(scope);
        let start = Instant::now();
        let resolution = self.epochs.rotate(scope, &key, epoch, &self.remote);
        self.stats.record_remote(resolution.writes.len(), start.elapsed());

        self.oplog.record(
            OperationLogEntry::new(Op::Flush, bookkeeping_group(scope), &key)
                .with_value(Value::from(epoch)),
        );
        self.record_replica_writes(scope, &resolution.writes);
        resolution.reached_replica()
    }

    /// Forgets everything this facade has memoized.
    pub fn flush_runtime(&mut self) {
        self.memo.clear();
    }

    // == Batches ==

    pub fn add_multiple<I, K>(&mut self, items: I, group: &str, expire: i64) -> IndexMap<String, bool>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        items
            .into_iter()
            .map(|(key, value)| {
                let added = self.add(key.as_ref(), value, group, expire);
                (key.as_ref().to_string(), added)
            })
            .collect()
    }

    pub fn set_multiple<I, K>(&mut self, items: I, group: &str, expire: i64) -> IndexMap<String, bool>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        items
            .into_iter()
            .map(|(key, value)| {
                let stored = self.set(key.as_ref(), value, group, expire);
                (key.as_ref().to_string(), stored)
            })
            .collect()
    }

    /// Looks up many keys, reading what the memo lacks with one batch per
    /// server. Results follow input order.
    pub fn get_multiple<S: AsRef<str>>(
        &mut self,
        keys: &[S],
        group: &str,
        force: bool,
    ) -> IndexMap<String, CacheEntry> {
        let group = group_name(group);
        let non_persistent = self.groups.is_non_persistent(group);
        let mut results = IndexMap::with_capacity(keys.len());
        let mut uncached: Vec<(String, String)> = Vec::new();

        for key in keys {
            let key = key.as_ref();
            let fq = self.key(key, group);
            match self.memo.get(&fq) {
                Some(entry) if !force || non_persistent => {
                    results.insert(key.to_string(), entry.clone());
                    self.stats.record_local_hit();
                }
                _ if non_persistent => {
                    results.insert(key.to_string(), CacheEntry::miss());
                    self.stats.record_miss();
                }
                _ => {
                    // Placeholder keeps the slot in input order.
                    results.insert(key.to_string(), CacheEntry::miss());
                    uncached.push((key.to_string(), fq));
                }
            }
        }

        if uncached.is_empty() {
            return results;
        }

        let fq_keys: Vec<String> = uncached.iter().map(|(_, fq)| fq.clone()).collect();
        let (values, elapsed) = self.timed(|remote| remote.get_multi(&fq_keys, group));
        self.oplog.record(
            OperationLogEntry::new(Op::GetMultiple, group, "")
                .with_keys(fq_keys)
                .with_elapsed(elapsed),
        );

        for (key, fq) in uncached {
            let entry = match values.get(&fq) {
                Some(value) => {
                    self.stats.record_remote_hit();
                    CacheEntry::hit(value.clone())
                }
                None => {
                    self.stats.record_miss();
                    CacheEntry::miss()
                }
            };
            self.memo.set(fq, entry.clone());
            results.insert(key, entry);
        }
        results
    }

    pub fn delete_multiple<S: AsRef<str>>(&mut self, keys: &[S], group: &str) -> IndexMap<String, bool> {
        let group = group_name(group);

        if self.groups.is_non_persistent(group) {
            return keys
                .iter()
                .map(|key| (key.as_ref().to_string(), self.delete(key.as_ref(), group)))
                .collect();
        }

        let mapped: Vec<(String, String)> = keys
            .iter()
            .map(|key| (key.as_ref().to_string(), self.key(key.as_ref(), group)))
            .collect();
        let fq_keys: Vec<String> = mapped.iter().map(|(_, fq)| fq.clone()).collect();
        for fq in &fq_keys {
            self.memo.remove(fq);
        }

        let start = Instant::now();
        let outcomes = self.remote.delete_multi(&fq_keys, group);
        let elapsed = start.elapsed();
        self.stats.record_remote(fq_keys.len(), elapsed);
        self.oplog.record(
            OperationLogEntry::new(Op::DeleteMultiple, group, "")
                .with_keys(fq_keys)
                .with_elapsed(elapsed),
        );

        mapped
            .into_iter()
            .map(|(key, fq)| {
                let deleted = outcomes.get(&fq).is_some_and(|outcome| outcome.is_ok());
                (key, deleted)
            })
            .collect()
    }

    // == Groups and Sites ==

    pub fn add_global_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.groups.add_global(groups);
    }

    pub fn add_non_persistent_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.groups.add_non_persistent(groups);
    }

    /// Points site-scoped groups at another site of the network.
    pub fn switch_to_blog(&mut self, site_id: u64) {
        debug!(site_id, "switching site");
        self.site.switch_to(site_id);
    }

    /// Closes every server connection.
    pub fn close(&self) {
        self.remote.close();
    }

    // == Introspection ==

    /// Memo entry of a key without touching the servers, except to resolve
    /// the epoch of its group.
    pub fn cached(&mut self, key: &str, group: &str) -> Option<CacheEntry> {
        let fq = self.key(key, group);
        self.memo.get(&fq).cloned()
    }

    pub fn supports(&self, feature: &str) -> bool {
        SUPPORTED_FEATURES.contains(&feature)
    }

    pub fn get_expiration(&self, expire: i64) -> u64 {
        self.expiration.resolve(expire)
    }

    pub fn operation_log(&self) -> &OperationLog {
        &self.oplog
    }

    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }

    pub fn site(&self) -> &SiteContext {
        &self.site
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub fn memo(&self) -> &LocalMemo {
        &self.memo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MemoryNode;
    use crate::remote::CacheBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn cache_with_nodes(count: usize) -> (Vec<Arc<MemoryNode>>, ObjectCache) {
        let nodes: Vec<Arc<MemoryNode>> = (0..count)
            .map(|i| Arc::new(MemoryNode::new(format!("node-{i}"), 1000)))
            .collect();
        let backends = nodes
            .iter()
            .map(|node| Arc::clone(node) as Arc<dyn CacheBackend>)
            .collect();
        let remote = RemoteCacheClient::with_servers(backends).unwrap();
        (nodes, ObjectCache::new(remote, SiteContext::single("wp_"), ""))
    }

    #[test]
    fn test_expiration_policy() {
        let policy = ExpirationPolicy::default();
        assert_eq!(policy.resolve(0), 0);
        assert_eq!(policy.resolve(-5), 0);
        assert_eq!(policy.resolve(60), 60);
        assert_eq!(policy.resolve(MAX_EXPIRATION as i64), MAX_EXPIRATION);
        assert_eq!(policy.resolve(MAX_EXPIRATION as i64 + 1), 0);

        let policy = ExpirationPolicy {
            default_expiration: 300,
            max_expiration: 3600,
        };
        assert_eq!(policy.resolve(7200), 300);
    }

    #[test]
    fn test_add_then_cached_entry() {
        let (_nodes, mut cache) = cache_with_nodes(1);

        assert!(cache.add("foo", json!("data"), "", 0));
        assert!(cache.key("foo", "default").contains("default:foo"));
        assert_eq!(
            cache.cached("foo", "default"),
            Some(CacheEntry::hit(json!("data")))
        );
    }

    #[test]
    fn test_add_blocked_by_found_memo_entry() {
        let (nodes, mut cache) = cache_with_nodes(1);
        assert!(cache.add("foo", json!(1), "g", 0));
        let calls = nodes[0].calls();

        assert!(!cache.add("foo", json!(2), "g", 0));
        assert_eq!(nodes[0].calls(), calls);
        assert_eq!(cache.get("foo", "g", false).value, json!(1));
    }

    #[test]
    fn test_failed_add_clears_memo() {
        let (_nodes, mut cache) = cache_with_nodes(1);
        assert!(cache.set("foo", json!("remote"), "g", 0));
        cache.flush_runtime();
        // A miss in the memo does not block the add; the server does.
        let fq = cache.key("foo", "g");
        assert!(!cache.add("foo", json!("local"), "g", 0));
        assert!(!cache.memo().contains(&fq));
        assert_eq!(cache.get("foo", "g", false).value, json!("remote"));
    }

    #[test]
    fn test_set_marks_found_only_on_remote_success() {
        let (nodes, mut cache) = cache_with_nodes(1);
        cache.key("warm", "g");
        nodes[0].set_available(false);

        assert!(!cache.set("k", json!("v"), "g", 0));
        let entry = cache.cached("k", "g").unwrap();
        assert_eq!(entry.value, json!("v"));
        assert!(!entry.found);
    }

    #[test]
    fn test_replace_requires_existing_key() {
        let (_nodes, mut cache) = cache_with_nodes(1);

        assert!(!cache.replace("k", json!(1), "g", 0));
        assert_eq!(cache.cached("k", "g"), None);

        cache.set("k", json!(1), "g", 0);
        assert!(cache.replace("k", json!(2), "g", 0));
        assert_eq!(cache.get("k", "g", true).value, json!(2));
    }

    #[test]
    fn test_get_caches_remote_result() {
        let (nodes, mut cache) = cache_with_nodes(1);
        cache.set("k", json!([1, 2]), "g", 0);
        cache.flush_runtime();

        let first = cache.get("k", "g", false);
        let calls = nodes[0].calls();
        let second = cache.get("k", "g", false);

        assert_eq!(first, CacheEntry::hit(json!([1, 2])));
        assert_eq!(first, second);
        assert_eq!(nodes[0].calls(), calls);
        assert_eq!(cache.stats().remote_hits, 1);
        assert_eq!(cache.stats().local_hits, 1);
    }

    #[test]
    fn test_get_unreachable_is_a_miss() {
        let (nodes, mut cache) = cache_with_nodes(1);
        cache.set("k", json!("v"), "g", 0);
        nodes[0].set_available(false);

        assert_eq!(cache.get("k", "g", true), CacheEntry::miss());
    }

    #[test]
    fn test_delete_always_clears_memo() {
        let (nodes, mut cache) = cache_with_nodes(1);
        cache.set("k", json!("v"), "g", 0);
        nodes[0].set_available(false);

        assert!(!cache.delete("k", "g"));
        assert_eq!(cache.cached("k", "g"), None);
    }

    #[test]
    fn test_incr_and_decr() {
        let (_nodes, mut cache) = cache_with_nodes(1);
        assert!(cache.add("n", json!(1), "g", 0));

        assert_eq!(cache.incr("n", 5, "g"), Some(6));
        assert_eq!(cache.get("n", "g", true).value, json!(6));
        assert_eq!(cache.decr("n", 10, "g"), Some(0));
        assert_eq!(cache.cached("n", "g"), Some(CacheEntry::hit(json!(0))));
    }

    #[test]
    fn test_incr_failure_leaves_memo_untouched() {
        let (_nodes, mut cache) = cache_with_nodes(1);
        assert_eq!(cache.incr("absent", 1, "g"), None);
        assert_eq!(cache.cached("absent", "g"), None);

        cache.set("text", json!("abc"), "g", 0);
        assert_eq!(cache.incr("text", 1, "g"), None);
        assert_eq!(cache.cached("text", "g"), Some(CacheEntry::hit(json!("abc"))));
    }

    #[test]
    fn test_non_persistent_counters_stay_local() {
        let (nodes, mut cache) = cache_with_nodes(1);
        cache.add_non_persistent_groups(["np"]);

        assert_eq!(cache.incr("n", 1, "np"), None);
        cache.set("n", json!("4"), "np", 0);
        assert_eq!(cache.incr("n", 3, "np"), Some(7));
        assert_eq!(cache.decr("n", 10, "np"), Some(0));
        assert_eq!(nodes[0].calls(), 0);
    }

    #[test]
    fn test_flush_changes_epoch_and_clears_memo() {
        let (_nodes, mut cache) = cache_with_nodes(2);
        cache.set("k", json!("v"), "g", 0);
        let before = cache.flush_prefix("g");

        assert!(cache.flush());

        assert!(cache.memo().is_empty());
        assert_ne!(cache.flush_prefix("g"), before);
        assert!(!cache.get("k", "g", false).found);
    }

    #[test]
    fn test_flush_fails_when_no_replica_reachable() {
        let (nodes, mut cache) = cache_with_nodes(2);
        for node in &nodes {
            node.set_available(false);
        }
        assert!(!cache.flush());
    }

    #[test]
    fn test_flush_group_prefix_is_unversioned() {
        let (_nodes, mut cache) = cache_with_nodes(1);
        cache.flush();
        assert_eq!(cache.flush_prefix(FLUSH_GROUP), "_:");
        assert_eq!(cache.flush_prefix(GLOBAL_FLUSH_GROUP), "_:");
    }

    #[test]
    fn test_get_multiple_preserves_order() {
        let (_nodes, mut cache) = cache_with_nodes(3);
        cache.set("b", json!("bar"), "g", 0);
        cache.set("a", json!(0), "g", 0);
        cache.flush_runtime();
        cache.set("c", json!("local"), "g", 0);

        let results = cache.get_multiple(&["c", "missing", "a", "b"], "g", false);

        let keys: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(keys, ["c", "missing", "a", "b"]);
        assert_eq!(results["a"], CacheEntry::hit(json!(0)));
        assert_eq!(results["missing"], CacheEntry::miss());
        assert_eq!(results["c"].value, json!("local"));
    }

    #[test]
    fn test_batch_writes_report_per_key() {
        let (_nodes, mut cache) = cache_with_nodes(2);
        cache.add("taken", json!(1), "g", 0);

        let added = cache.add_multiple([("taken", json!(2)), ("free", json!(3))], "g", 0);
        assert_eq!(added["taken"], false);
        assert_eq!(added["free"], true);

        let stored = cache.set_multiple(vec![("x".to_string(), json!(null))], "g", 0);
        assert_eq!(stored["x"], true);

        let deleted = cache.delete_multiple(&["x", "nope"], "g");
        assert_eq!(deleted["x"], true);
        assert_eq!(deleted["nope"], false);
        assert_eq!(cache.cached("x", "g"), None);
    }

    #[test]
    fn test_supports() {
        let (_nodes, cache) = cache_with_nodes(1);
        assert!(cache.supports("get_multiple"));
        assert!(cache.supports("flush_runtime"));
        assert!(!cache.supports("flush_group"));
    }

    #[test]
    fn test_epoch_resolution_is_logged() {
        let (_nodes, mut cache) = cache_with_nodes(2);
        cache.key("k", "g");

        let log = cache.operation_log();
        assert_eq!(log.count(FLUSH_GROUP, Op::GetFlushNumber, None), 1);
        assert_eq!(log.count(FLUSH_GROUP, Op::SetFlushNumber, Some("replication")), 2);
    }
}
