//! Configuration Module
//!
//! Loads the cache configuration from environment variables.

use std::env;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{CacheError, Result};
use crate::object_cache::{ExpirationPolicy, MAX_EXPIRATION};
use crate::remote::{ServerAddress, DEFAULT_BUCKET};
use crate::site::SiteContext;

/// Server list used when `CACHE_SERVERS` is unset.
pub const DEFAULT_SERVERS: &str = "127.0.0.1:11211";

/// Cache configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server addresses per bucket; always holds a `default` bucket
    pub servers: IndexMap<String, Vec<ServerAddress>>,
    /// Salt mixed into every key
    pub key_salt: String,
    pub site_id: u64,
    pub main_site_id: u64,
    pub multisite: bool,
    pub table_prefix: String,
    /// Groups shared by every site of the network
    pub global_groups: Vec<String>,
    /// Groups kept in the local memo only
    pub non_persistent_groups: Vec<String>,
    /// Expiration used when a request asks for none or too much
    pub default_expiration: u64,
    /// Longest expiration honored, in seconds
    pub max_expiration: u64,
    /// Capacity of each memory node
    pub node_max_entries: usize,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SERVERS` - `bucket=addr,addr;bucket=addr` or a plain comma
    ///   list for the default bucket (default: 127.0.0.1:11211)
    /// - `CACHE_KEY_SALT` - Key salt (default: empty)
    /// - `SITE_ID` / `MAIN_SITE_ID` - Current and main site (default: 1)
    /// - `MULTISITE` - Network mode (default: false)
    /// - `TABLE_PREFIX` - Single-site key prefix (default: wp_)
    /// - `GLOBAL_GROUPS` / `NON_PERSISTENT_GROUPS` - Comma-separated groups
    /// - `DEFAULT_EXPIRATION` - Fallback expiration in seconds (default: 0)
    /// - `MAX_EXPIRATION` - Longest expiration in seconds (default: 2592000)
    /// - `NODE_MAX_ENTRIES` - Items per memory node (default: 1000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let servers = match lookup("CACHE_SERVERS") {
            Some(raw) if !raw.trim().is_empty() => parse_servers(&raw)?,
            _ => defaults.servers,
        };

        Ok(Self {
            servers,
            key_salt: lookup("CACHE_KEY_SALT").unwrap_or(defaults.key_salt),
            site_id: parse_var(&lookup, "SITE_ID").unwrap_or(defaults.site_id),
            main_site_id: parse_var(&lookup, "MAIN_SITE_ID").unwrap_or(defaults.main_site_id),
            multisite: lookup("MULTISITE")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.multisite),
            table_prefix: lookup("TABLE_PREFIX").unwrap_or(defaults.table_prefix),
            global_groups: lookup("GLOBAL_GROUPS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            non_persistent_groups: lookup("NON_PERSISTENT_GROUPS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            default_expiration: parse_var(&lookup, "DEFAULT_EXPIRATION")
                .unwrap_or(defaults.default_expiration),
            max_expiration: parse_var(&lookup, "MAX_EXPIRATION")
                .unwrap_or(defaults.max_expiration),
            node_max_entries: parse_var(&lookup, "NODE_MAX_ENTRIES")
                .unwrap_or(defaults.node_max_entries),
            cleanup_interval: parse_var(&lookup, "CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
        })
    }

    pub fn site(&self) -> SiteContext {
        SiteContext::new(self.site_id, self.multisite, self.table_prefix.clone())
            .with_main_site(self.main_site_id)
    }

    pub fn expiration(&self) -> ExpirationPolicy {
        ExpirationPolicy {
            default_expiration: self.default_expiration,
            max_expiration: self.max_expiration,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: IndexMap::from([(
                DEFAULT_BUCKET.to_string(),
                vec![ServerAddress::parse(DEFAULT_SERVERS)],
            )]),
            key_salt: String::new(),
            site_id: 1,
            main_site_id: 1,
            multisite: false,
            table_prefix: "wp_".to_string(),
            global_groups: Vec::new(),
            non_persistent_groups: Vec::new(),
            default_expiration: 0,
            max_expiration: MAX_EXPIRATION,
            node_max_entries: 1000,
            cleanup_interval: 1,
        }
    }
}

/// Parses `bucket=addr,addr;bucket=addr`, or a plain address list which
/// becomes the default bucket.
pub fn parse_servers(raw: &str) -> Result<IndexMap<String, Vec<ServerAddress>>> {
    let mut buckets = IndexMap::new();

    for section in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (bucket, addresses) = match section.split_once('=') {
            Some((bucket, addresses)) => (bucket.trim(), addresses),
            None => (DEFAULT_BUCKET, section),
        };
        if bucket.is_empty() {
            return Err(CacheError::Config(format!("missing bucket name in '{section}'")));
        }

        let addresses: Vec<ServerAddress> = parse_list(addresses)
            .iter()
            .map(|address| ServerAddress::parse(address))
            .collect();
        if addresses.is_empty() {
            return Err(CacheError::Config(format!("bucket '{bucket}' has no servers")));
        }
        buckets
            .entry(bucket.to_string())
            .or_insert_with(Vec::new)
            .extend(addresses);
    }

    if !buckets.contains_key(DEFAULT_BUCKET) {
        return Err(CacheError::Config("a default bucket is required".to_string()));
    }
    Ok(buckets)
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
