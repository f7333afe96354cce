//! Object Cache Module
//!
//! Two-tier object cache with flush-number invalidation: a request-local
//! memo in front of the remote servers, with keys versioned by per-scope
//! epochs replicated across the default bucket.

mod epoch;
mod facade;
mod groups;
mod keys;
mod memo;
mod oplog;
mod stats;


pub use epoch::{
    reconcile, EpochResolution, FlushEpochStore, FlushScope, Reconciliation, ReplicaRead,
    ReplicaWrite, WriteReason,
};
pub use facade::{ExpirationPolicy, ObjectCache, MAX_EXPIRATION, SUPPORTED_FEATURES};
pub use groups::{
    group_name, is_flush_group, GroupKind, GroupRegistry, GroupScope, Persistence, DEFAULT_GROUP,
    FLUSH_GROUP, FLUSH_KEY, GLOBAL_FLUSH_GROUP,
};
pub use keys::{salt_keys, versioned_prefix, KeyBuilder, UNVERSIONED_PREFIX};
pub use memo::{CacheEntry, LocalMemo};
pub use oplog::{Op, OperationLog, OperationLogEntry, MAX_ENTRIES_PER_GROUP};
pub use stats::RequestStats;
