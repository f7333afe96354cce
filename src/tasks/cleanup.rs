//! Expiration Sweep Task
//!
//! Background task that periodically removes expired items from memory nodes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::node::MemoryNode;

/// Spawns a background task that sweeps expired items out of `nodes`.
///
/// The task loops forever, sleeping for `cleanup_interval_secs` between
/// sweeps. Unavailable nodes are swept too: availability only models the
/// network, not the node's memory.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let nodes = vec![Arc::new(MemoryNode::new("127.0.0.1:11211", 1000))];
/// let cleanup_handle = spawn_cleanup_task(nodes.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(nodes: Vec<Arc<MemoryNode>>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            nodes = nodes.len(),
            "Starting expiration sweep with interval of {} seconds", cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            // Each node's lock is held only for its own sweep.
            let removed: usize = nodes.iter().map(|node| node.cleanup_expired()).sum();

            if removed > 0 {
                info!("Expiration sweep: removed {} expired items", removed);
            } else {
                debug!("Expiration sweep: no expired items found");
            }
        }
    })
}
