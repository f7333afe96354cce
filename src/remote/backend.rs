//! Backend Server Trait
//!
//! One backend cache server as seen by the remote client. Implementations
//! own their transport; timeouts and disconnects surface as
//! `CacheError::RemoteUnavailable`.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;

/// A single cache server endpoint.
///
/// All keys are fully-qualified. Expiration follows memcached: `0` never
/// expires, up to 30 days is relative seconds, anything larger is an
/// absolute Unix timestamp.
pub trait CacheBackend: Send + Sync {
    /// Endpoint name, used in logs.
    fn name(&self) -> &str;

    /// Fetches one item. `Ok(None)` is a miss.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Fetches several items; absent keys are left out of the map.
    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    /// Stores unconditionally.
    fn set(&self, key: &str, value: Value, expire: u64) -> Result<()>;

    /// Stores only if the key is absent, `NotStored` otherwise.
    fn add(&self, key: &str, value: Value, expire: u64) -> Result<()>;

    /// Stores only if the key exists, `NotFound` otherwise.
    fn replace(&self, key: &str, value: Value, expire: u64) -> Result<()>;

    /// Removes an item, `NotFound` if it was absent.
    fn delete(&self, key: &str) -> Result<()>;

    /// Atomically increments a numeric item and returns the new value.
    fn incr(&self, key: &str, delta: u64) -> Result<u64>;

    /// Atomically decrements a numeric item and returns the new value.
    fn decr(&self, key: &str, delta: u64) -> Result<u64>;

    /// Closes the connection. Further calls may reconnect.
    fn quit(&self) {}
}
