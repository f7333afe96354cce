//! Object Cache - a two-tier object cache with flush-number invalidation
//!
//! A request-local memo in front of a pool of cache servers. Keys are
//! versioned by replicated per-site and global flush numbers, so a flush
//! invalidates a whole namespace without deleting anything.

pub mod config;
pub mod error;
pub mod node;
pub mod object_cache;
pub mod remote;
pub mod shell;
pub mod site;
pub mod tasks;
pub mod value;

pub use config::Config;
pub use error::{CacheError, Result};
pub use node::MemoryNode;
pub use object_cache::{CacheEntry, ObjectCache};
pub use remote::{CacheBackend, RemoteCacheClient};
pub use shell::Shell;
pub use site::SiteContext;
pub use tasks::spawn_cleanup_task;
