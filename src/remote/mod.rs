//! Remote Tier Module
//!
//! The backend server trait, server address parsing and the pooled client
//! the object cache talks to.

mod address;
mod backend;
mod pool;

pub use address::ServerAddress;
pub use backend::CacheBackend;
pub use pool::{RemoteCacheClient, ServerPool, DEFAULT_BUCKET};
