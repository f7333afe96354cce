//! Flush epochs.
//!
//! Every scope (the network, or one site) has a flush number stored under an
//! unversioned bookkeeping key on every replica. Keys embed the number of
//! their scope, so writing a new number orphans everything written under the
//! old one without deleting it.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::remote::RemoteCacheClient;
use crate::value::counter_value;

/// Namespace a flush number applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum FlushScope {
    Global,
    /// A site, identified by its key prefix.
    Site(String),
}

impl fmt::Display for FlushScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushScope::Global => write!(f, "global"),
            FlushScope::Site(prefix) => write!(f, "site:{prefix}"),
        }
    }
}

/// Why a flush number was written to a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteReason {
    /// A new number written to every replica.
    Replication,
    /// An existing number copied to a replica that lost or missed it.
    ReplicationRepair,
}

impl WriteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteReason::Replication => "replication",
            WriteReason::ReplicationRepair => "replication_repair",
        }
    }
}

/// One flush-number write against one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaWrite {
    pub replica: usize,
    pub key: String,
    pub epoch: u64,
    pub reason: WriteReason,
    pub ok: bool,
}

/// What a replica answered for a bookkeeping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRead {
    Value(u64),
    Missing,
    Unreachable,
}

impl From<Result<Option<Value>>> for ReplicaRead {
    fn from(read: Result<Option<Value>>) -> Self {
        match read {
            Ok(Some(value)) => counter_value(&value).map_or(ReplicaRead::Missing, ReplicaRead::Value),
            Ok(None) => ReplicaRead::Missing,
            Err(_) => ReplicaRead::Unreachable,
        }
    }
}

/// Agreement between replicas on a flush number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Highest non-zero number any replica holds.
    pub authoritative: Option<u64>,
    /// First replica holding the authoritative number.
    pub source: Option<usize>,
    /// Reachable replicas holding nothing or a different number.
    pub lagging: Vec<usize>,
    /// Number of replicas that answered.
    pub reachable: usize,
}

/// Works out which replicas need repair.
///
/// Numbers are minted from the clock, so the highest one is the most recent
/// rotation; a replica holding an older number missed that rotation.
pub fn reconcile(reads: &[ReplicaRead]) -> Reconciliation {
    let authoritative = reads
        .iter()
        .filter_map(|read| match read {
            ReplicaRead::Value(epoch) if *epoch > 0 => Some(*epoch),
            _ => None,
        })
        .max();

    let source = authoritative.and_then(|epoch| {
        reads
            .iter()
            .position(|read| *read == ReplicaRead::Value(epoch))
    });

    let lagging = match authoritative {
        Some(epoch) => reads
            .iter()
            .enumerate()
            .filter(|(_, read)| match read {
                ReplicaRead::Value(held) => *held != epoch,
                ReplicaRead::Missing => true,
                ReplicaRead::Unreachable => false,
            })
            .map(|(index, _)| index)
            .collect(),
        None => Vec::new(),
    };

    Reconciliation {
        authoritative,
        source,
        lagging,
        reachable: reads
            .iter()
            .filter(|read| **read != ReplicaRead::Unreachable)
            .count(),
    }
}

/// Result of resolving or rotating a scope's epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochResolution {
    pub epoch: u64,
    /// Replica writes performed along the way, for the operation log.
    pub writes: Vec<ReplicaWrite>,
}

impl EpochResolution {
    fn cached(epoch: u64) -> Self {
        Self {
            epoch,
            writes: Vec::new(),
        }
    }

    /// True if at least one replica accepted a write.
    pub fn reached_replica(&self) -> bool {
        self.writes.iter().any(|write| write.ok)
    }
}

// == Flush Epoch Store ==
/// Per-facade cache of flush numbers with the replica protocol around it.
#[derive(Debug, Default)]
pub struct FlushEpochStore {
    cached: HashMap<FlushScope, u64>,
    last_minted: u64,
}

impl FlushEpochStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The epoch this store currently uses for `scope`, if resolved.
    pub fn cached(&self, scope: &FlushScope) -> Option<u64> {
        self.cached.get(scope).copied()
    }

    /// Overrides the locally cached epoch. A value of 0 forces the next
    /// resolution to go back to the replicas.
    pub fn set_cached(&mut self, scope: FlushScope, epoch: u64) {
        self.cached.insert(scope, epoch);
    }

    /// Drops every cached epoch.
    pub fn clear(&mut self) {
        self.cached.clear();
    }

    /// Mints a new epoch: microseconds since the Unix epoch, above every
    /// epoch this store has minted or adopted.
    ///
    /// An adopted `u64::MAX` has no successor, so the clock is used as is.
    pub fn mint(&mut self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0);
        let epoch = match self.last_minted.checked_add(1) {
            Some(next) => now.max(next),
            None => now,
        };
        self.last_minted = epoch;
        epoch
    }

    // == Get Or Init ==
    /// Resolves the epoch of `scope`, reading `key` from the replicas on the
    /// first call.
    ///
    /// A missing or zero number rotates the scope. Replicas that disagree
    /// with the authoritative number are repaired. With no replica
    /// reachable a local epoch is minted so the request can proceed.
    pub fn get_or_init(
        &mut self,
        scope: &FlushScope,
        key: &str,
        remote: &RemoteCacheClient,
    ) -> EpochResolution {
        if let Some(epoch) = self.cached(scope).filter(|epoch| *epoch != 0) {
            return EpochResolution::cached(epoch);
        }

        let reads: Vec<ReplicaRead> = remote
            .get_with_redundancy(key)
            .into_iter()
            .map(ReplicaRead::from)
            .collect();
        let reconciliation = reconcile(&reads);

        if reconciliation.reachable == 0 {
            let epoch = self.mint();
            warn!(%scope, epoch, "no replica reachable, using local flush number");
            self.cached.insert(scope.clone(), epoch);
            return EpochResolution::cached(epoch);
        }

        match reconciliation.authoritative {
            None => {
                let epoch = self.mint();
                info!(%scope, epoch, "initializing flush number");
                self.rotate(scope, key, epoch, remote)
            }
            Some(epoch) => {
                let writes = if reconciliation.lagging.is_empty() {
                    Vec::new()
                } else {
                    warn!(
                        %scope,
                        epoch,
                        lagging = ?reconciliation.lagging,
                        "repairing flush number replication"
                    );
                    Self::write(
                        remote,
                        key,
                        epoch,
                        Some(&reconciliation.lagging),
                        WriteReason::ReplicationRepair,
                    )
                };
                debug!(%scope, epoch, "resolved flush number");
                self.last_minted = self.last_minted.max(epoch);
                self.cached.insert(scope.clone(), epoch);
                EpochResolution { epoch, writes }
            }
        }
    }

    // == Rotate ==
    /// Writes `epoch` to every replica and adopts it for `scope`.
    pub fn rotate(
        &mut self,
        scope: &FlushScope,
        key: &str,
        epoch: u64,
        remote: &RemoteCacheClient,
    ) -> EpochResolution {
        let writes = Self::write(remote, key, epoch, None, WriteReason::Replication);
        if !writes.iter().any(|write| write.ok) {
            warn!(%scope, epoch, "flush number rotation reached no replica");
        }
        self.cached.insert(scope.clone(), epoch);
        EpochResolution { epoch, writes }
    }

    /// Mints a new epoch and rotates `scope` to it.
    pub fn flush(
        &mut self,
        scope: &FlushScope,
        key: &str,
        remote: &RemoteCacheClient,
    ) -> EpochResolution {
        let epoch = self.mint();
        self.rotate(scope, key, epoch, remote)
    }

    fn write(
        remote: &RemoteCacheClient,
        key: &str,
        epoch: u64,
        targets: Option<&[usize]>,
        reason: WriteReason,
    ) -> Vec<ReplicaWrite> {
        remote
            .set_with_redundancy(key, &Value::from(epoch), targets)
            .into_iter()
            .map(|(replica, result)| {
                if let Err(err) = &result {
                    warn!(replica, error = %err, "flush number write failed");
                }
                ReplicaWrite {
                    replica,
                    key: key.to_string(),
                    epoch,
                    reason,
                    ok: result.is_ok(),
                }
            })
            .collect()
    }
}
