//! Expiry Cleanup Task
//!
//! Background task that periodically removes expired entries from the local
//! stores. Reads already skip expired entries; this keeps them from holding
//! capacity until the next read or eviction.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::tiered::TieredCache;

/// Spawns a background task that purges expired local entries.
///
/// Each run purges the tiered cache's local tier and the base cache's local
/// fallback store. An interval of zero is treated as one second.
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it when the engine closes.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(engine.tiered().clone(), 5);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(tiered: Arc<TieredCache>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let cleanup_interval_secs = cleanup_interval_secs.max(1);
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let tier_removed = tiered.purge_expired();
            let base_removed = tiered.base().purge_expired();

            if tier_removed + base_removed > 0 {
                info!(
                    tier_removed,
                    base_removed, "Expiry cleanup removed expired local entries"
                );
            } else {
                debug!("Expiry cleanup: no expired entries found");
            }
        }
    })
}
