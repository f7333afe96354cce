//! Server Pools
//!
//! Buckets of backend servers. Inside a bucket each fully-qualified key maps
//! to one server by hashing; the `default` bucket's servers double as the
//! replica set for flush numbers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::{CacheError, Result};
use crate::remote::CacheBackend;

/// Name of the bucket that serves every group without a bucket of its own.
pub const DEFAULT_BUCKET: &str = "default";

// == Server Pool ==
/// A set of servers sharing one key space.
#[derive(Clone)]
pub struct ServerPool {
    servers: Vec<Arc<dyn CacheBackend>>,
}

impl ServerPool {
    pub fn new(servers: Vec<Arc<dyn CacheBackend>>) -> Self {
        Self { servers }
    }

    /// Index of the server owning `key`. Stable for a given server count.
    pub fn server_index(&self, key: &str) -> usize {
        let digest = blake3::hash(key.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(head) % self.servers.len().max(1) as u64) as usize
    }

    /// Server owning `key`.
    pub fn server_for(&self, key: &str) -> Result<&Arc<dyn CacheBackend>> {
        if self.servers.is_empty() {
            return Err(CacheError::RemoteUnavailable("empty server pool".to_string()));
        }
        Ok(&self.servers[self.server_index(key)])
    }

    pub fn servers(&self) -> &[Arc<dyn CacheBackend>] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Splits keys by owning server, keeping each server's keys in input order.
    fn partition<'a>(&self, keys: &'a [String]) -> Vec<(usize, Vec<&'a String>)> {
        let mut by_server: Vec<(usize, Vec<&String>)> = Vec::new();
        for key in keys {
            let index = self.server_index(key);
            match by_server.iter_mut().find(|(i, _)| *i == index) {
                Some((_, batch)) => batch.push(key),
                None => by_server.push((index, vec![key])),
            }
        }
        by_server
    }
}

// == Remote Cache Client ==
/// Entry point to the remote tier: bucket routing, per-key hashing and
/// replicated flush-number access.
#[derive(Clone)]
pub struct RemoteCacheClient {
    buckets: HashMap<String, ServerPool>,
    default_pool: ServerPool,
    replicas: Vec<Arc<dyn CacheBackend>>,
}

impl RemoteCacheClient {
    /// Builds a client from named buckets of servers.
    ///
    /// A `default` bucket is required; its servers form the replica set.
    pub fn new(buckets: HashMap<String, Vec<Arc<dyn CacheBackend>>>) -> Result<Self> {
        let replicas = buckets
            .get(DEFAULT_BUCKET)
            .filter(|servers| !servers.is_empty())
            .cloned()
            .ok_or_else(|| CacheError::Config("a non-empty default bucket is required".to_string()))?;

        let default_pool = ServerPool::new(replicas.clone());
        let buckets = buckets
            .into_iter()
            .filter(|(name, _)| name != DEFAULT_BUCKET)
            .map(|(name, servers)| (name, ServerPool::new(servers)))
            .collect();

        Ok(Self {
            buckets,
            default_pool,
            replicas,
        })
    }

    /// Builds a client with a single `default` bucket.
    pub fn with_servers(servers: Vec<Arc<dyn CacheBackend>>) -> Result<Self> {
        Self::new(HashMap::from([(DEFAULT_BUCKET.to_string(), servers)]))
    }

    /// Pool serving `group`: its own bucket if configured, else `default`.
    pub fn pool(&self, group: &str) -> &ServerPool {
        self.buckets.get(group).unwrap_or(&self.default_pool)
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn replica_name(&self, index: usize) -> Option<&str> {
        self.replicas.get(index).map(|replica| replica.name())
    }

    // == Single-key commands ==

    pub fn get(&self, key: &str, group: &str) -> Result<Option<Value>> {
        self.pool(group).server_for(key)?.get(key)
    }

    pub fn set(&self, key: &str, group: &str, value: Value, expire: u64) -> Result<()> {
        self.pool(group).server_for(key)?.set(key, value, expire)
    }

    pub fn add(&self, key: &str, group: &str, value: Value, expire: u64) -> Result<()> {
        self.pool(group).server_for(key)?.add(key, value, expire)
    }

    pub fn replace(&self, key: &str, group: &str, value: Value, expire: u64) -> Result<()> {
        self.pool(group).server_for(key)?.replace(key, value, expire)
    }

    pub fn delete(&self, key: &str, group: &str) -> Result<()> {
        self.pool(group).server_for(key)?.delete(key)
    }

    pub fn incr(&self, key: &str, group: &str, delta: u64) -> Result<u64> {
        self.pool(group).server_for(key)?.incr(key, delta)
    }

    pub fn decr(&self, key: &str, group: &str, delta: u64) -> Result<u64> {
        self.pool(group).server_for(key)?.decr(key, delta)
    }

    // == Multi-key commands ==

    /// Fetches many keys with one call per owning server.
    ///
    /// Keys on an unreachable server are simply absent from the result.
    pub fn get_multi(&self, keys: &[String], group: &str) -> HashMap<String, Value> {
        let pool = self.pool(group);
        let mut found = HashMap::with_capacity(keys.len());

        for (index, batch) in pool.partition(keys) {
            let server = &pool.servers()[index];
            let batch: Vec<String> = batch.into_iter().cloned().collect();
            match server.get_multi(&batch) {
                Ok(values) => found.extend(values),
                Err(err) => warn!(server = server.name(), error = %err, "get_multi failed"),
            }
        }

        found
    }

    /// Deletes many keys, reporting each key's outcome.
    pub fn delete_multi(&self, keys: &[String], group: &str) -> HashMap<String, Result<()>> {
        keys.iter()
            .map(|key| (key.clone(), self.delete(key, group)))
            .collect()
    }

    // == Replicated access ==

    /// Reads `key` from every replica, in replica order.
    pub fn get_with_redundancy(&self, key: &str) -> Vec<Result<Option<Value>>> {
        self.replicas.iter().map(|replica| replica.get(key)).collect()
    }

    /// Writes `key` to every replica, or only to `targets` when given.
    ///
    /// Returns the outcome per replica index written.
    pub fn set_with_redundancy(
        &self,
        key: &str,
        value: &Value,
        targets: Option<&[usize]>,
    ) -> Vec<(usize, Result<()>)> {
        self.replicas
            .iter()
            .enumerate()
            .filter(|(index, _)| targets.map_or(true, |only| only.contains(index)))
            .map(|(index, replica)| (index, replica.set(key, value.clone(), 0)))
            .collect()
    }

    /// Closes every server connection.
    pub fn close(&self) {
        for pool in self.buckets.values().chain(std::iter::once(&self.default_pool)) {
            for server in pool.servers() {
                server.quit();
            }
        }
    }
}
