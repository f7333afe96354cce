//! Command Shell
//!
//! Line-oriented commands driving one object cache over a cluster of memory
//! nodes. Every command answers with one JSON value.
//!
//! ```text
//! get <key> [group] [--force]
//! set|add|replace <key> <json> [group] [ttl]
//! delete <key> [group]
//! incr|decr <key> [offset] [group]
//! flush | flush-runtime | switch <site> | log <group> | stats
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::node::MemoryNode;
use crate::object_cache::{ObjectCache, DEFAULT_GROUP};
use crate::remote::{CacheBackend, RemoteCacheClient};

// == Commands ==
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get { key: String, group: String, force: bool },
    Set { key: String, value: Value, group: String, ttl: i64 },
    Add { key: String, value: Value, group: String, ttl: i64 },
    Replace { key: String, value: Value, group: String, ttl: i64 },
    Delete { key: String, group: String },
    Incr { key: String, offset: u64, group: String },
    Decr { key: String, offset: u64, group: String },
    Flush,
    FlushRuntime,
    Switch { site_id: u64 },
    Log { group: String },
    Stats,
}

impl Command {
    /// Parses one command line.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match name.to_ascii_lowercase().as_str() {
            "get" => {
                let mut args: Vec<&str> = rest.split_whitespace().collect();
                let force = match args.iter().position(|arg| *arg == "--force") {
                    Some(index) => {
                        args.remove(index);
                        true
                    }
                    None => false,
                };
                let (key, tail) = key_arg(&args)?;
                Ok(Command::Get {
                    key,
                    group: group_arg(tail.first().copied()),
                    force,
                })
            }
            "set" | "add" | "replace" => {
                let rest = rest.trim_start();
                let (key, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if key.is_empty() {
                    return Err(invalid("missing key"));
                }
                let (value, rest) = value_arg(rest)?;
                let tail: Vec<&str> = rest.split_whitespace().collect();
                let group = group_arg(tail.first().copied());
                let ttl = match tail.get(1) {
                    Some(ttl) => ttl
                        .parse()
                        .map_err(|_| invalid(&format!("invalid ttl '{ttl}'")))?,
                    None => 0,
                };
                let key = key.to_string();
                Ok(match name.to_ascii_lowercase().as_str() {
                    "set" => Command::Set { key, value, group, ttl },
                    "add" => Command::Add { key, value, group, ttl },
                    _ => Command::Replace { key, value, group, ttl },
                })
            }
            "delete" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                let (key, tail) = key_arg(&args)?;
                Ok(Command::Delete {
                    key,
                    group: group_arg(tail.first().copied()),
                })
            }
            "incr" | "decr" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                let (key, tail) = key_arg(&args)?;
                let offset = match tail.first() {
                    Some(offset) => offset
                        .parse()
                        .map_err(|_| invalid(&format!("offset must be a non-negative integer, got '{offset}'")))?,
                    None => 1,
                };
                let group = group_arg(tail.get(1).copied());
                Ok(if name.eq_ignore_ascii_case("incr") {
                    Command::Incr { key, offset, group }
                } else {
                    Command::Decr { key, offset, group }
                })
            }
            "flush" => Ok(Command::Flush),
            "flush-runtime" => Ok(Command::FlushRuntime),
            "switch" => {
                let site = rest.trim();
                let site_id = site
                    .parse()
                    .map_err(|_| invalid(&format!("invalid site id '{site}'")))?;
                Ok(Command::Switch { site_id })
            }
            "log" => Ok(Command::Log {
                group: group_arg(rest.split_whitespace().next()),
            }),
            "stats" => Ok(Command::Stats),
            "" => Err(invalid("empty command")),
            other => Err(invalid(&format!("unknown command '{other}'"))),
        }
    }
}

fn invalid(message: &str) -> CacheError {
    CacheError::InvalidRequest(message.to_string())
}

fn key_arg<'a>(args: &'a [&'a str]) -> Result<(String, &'a [&'a str])> {
    match args.split_first() {
        Some((key, tail)) => Ok((key.to_string(), tail)),
        None => Err(invalid("missing key")),
    }
}

fn group_arg(group: Option<&str>) -> String {
    group.unwrap_or(DEFAULT_GROUP).to_string()
}

/// Reads one JSON value off the front of `input`. A token that is not JSON
/// is taken as a plain string.
fn value_arg(input: &str) -> Result<(Value, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return Err(invalid("missing value"));
    }

    let mut stream = serde_json::Deserializer::from_str(input).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Ok((value, &input[stream.byte_offset()..])),
        _ => {
            let (token, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
            Ok((Value::String(token.to_string()), rest))
        }
    }
}

// == Shell ==
/// A facade over in-process nodes, fed one command line at a time.
pub struct Shell {
    cache: ObjectCache,
    nodes: Vec<Arc<MemoryNode>>,
}

impl Shell {
    pub fn new(cache: ObjectCache, nodes: Vec<Arc<MemoryNode>>) -> Self {
        Self { cache, nodes }
    }

    /// Builds one memory node per configured address and a facade over them.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (nodes, remote) = memory_cluster(config)?;
        Ok(Self::new(ObjectCache::from_config(config, remote), nodes))
    }

    pub fn nodes(&self) -> &[Arc<MemoryNode>] {
        &self.nodes
    }

    pub fn cache(&mut self) -> &mut ObjectCache {
        &mut self.cache
    }

    /// Parses and runs one line, reporting errors as `{"error": ...}`.
    pub fn run_line(&mut self, line: &str) -> Value {
        match Command::parse(line) {
            Ok(command) => self.execute(command),
            Err(err) => json!({ "error": err.to_string() }),
        }
    }

    pub fn execute(&mut self, command: Command) -> Value {
        debug!(?command, "executing");
        let cache = &mut self.cache;

        match command {
            Command::Get { key, group, force } => {
                let entry = cache.get(&key, &group, force);
                json!({ "key": key, "group": group, "value": entry.value, "found": entry.found })
            }
            Command::Set { key, value, group, ttl } => {
                json!({ "stored": cache.set(&key, value, &group, ttl) })
            }
            Command::Add { key, value, group, ttl } => {
                json!({ "stored": cache.add(&key, value, &group, ttl) })
            }
            Command::Replace { key, value, group, ttl } => {
                json!({ "stored": cache.replace(&key, value, &group, ttl) })
            }
            Command::Delete { key, group } => json!({ "deleted": cache.delete(&key, &group) }),
            Command::Incr { key, offset, group } => counter_result(cache.incr(&key, offset, &group)),
            Command::Decr { key, offset, group } => counter_result(cache.decr(&key, offset, &group)),
            Command::Flush => json!({ "flushed": cache.flush() }),
            Command::FlushRuntime => {
                cache.flush_runtime();
                json!({ "flushed": true })
            }
            Command::Switch { site_id } => {
                cache.switch_to_blog(site_id);
                json!({ "site_id": site_id, "site_prefix": cache.site().site_prefix() })
            }
            Command::Log { group } => {
                json!({ "group": group, "entries": cache.operation_log().entries(&group) })
            }
            Command::Stats => {
                let nodes: HashMap<&str, _> = self
                    .nodes
                    .iter()
                    .map(|node| (node.name(), node.stats()))
                    .collect();
                json!({ "request": self.cache.stats(), "nodes": nodes })
            }
        }
    }
}

fn counter_result(result: Option<u64>) -> Value {
    match result {
        Some(value) => json!({ "value": value }),
        None => json!({ "value": false }),
    }
}

/// Creates a memory node for every configured address, grouped into the
/// configured buckets.
pub fn memory_cluster(config: &Config) -> Result<(Vec<Arc<MemoryNode>>, RemoteCacheClient)> {
    let mut nodes = Vec::new();
    let mut buckets: HashMap<String, Vec<Arc<dyn CacheBackend>>> = HashMap::new();

    for (bucket, addresses) in &config.servers {
        for address in addresses {
            let node = Arc::new(MemoryNode::new(address.to_string(), config.node_max_entries));
            buckets
                .entry(bucket.clone())
                .or_default()
                .push(Arc::clone(&node) as Arc<dyn CacheBackend>);
            nodes.push(node);
        }
    }

    let remote = RemoteCacheClient::new(buckets)?;
    Ok((nodes, remote))
}
