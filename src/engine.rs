//! Cache Engine
//!
//! Owns every component built from one `Config`: the shared-tier connection,
//! the base and tiered caches, the adaptive manager, the query cache, the
//! limiter and the cleanup task.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adaptive::AdaptiveCacheManager;
use crate::cache::{shared, BaseCache, SharedStore};
use crate::config::Config;
use crate::invalidation::QueryCache;
use crate::limiter::SlidingWindowLimiter;
use crate::tasks::spawn_cleanup_task;
use crate::tiered::{TierTtls, TieredCache, WriteBackConfig};

pub struct CacheEngine {
    config: Config,
    base: Arc<BaseCache>,
    tiered: Arc<TieredCache>,
    adaptive: AdaptiveCacheManager,
    query: QueryCache,
    limiter: SlidingWindowLimiter,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl CacheEngine {
    // == Open ==
    /// Connects the shared tier and starts the engine.
    ///
    /// A shared tier that cannot be reached is logged and the engine runs in
    /// local-only mode; opening never fails.
    pub async fn open(config: Config) -> Self {
        let shared = shared::connect(&config.redis_url).await;
        Self::with_shared(config, shared)
    }

    /// Starts the engine over an already-connected shared tier (or none).
    ///
    /// Spawns background tasks, so it must be called inside a tokio runtime.
    pub fn with_shared(config: Config, shared: Option<Arc<dyn SharedStore>>) -> Self {
        let base = Arc::new(BaseCache::new(
            shared.clone(),
            config.local_capacity,
            config.default_ttl,
        ));

        let ttls = TierTtls {
            local: config.local_tier_ttl,
            shared: config.shared_tier_ttl,
        };
        let write_back = WriteBackConfig {
            capacity: config.write_back_queue,
            delay: Duration::from_millis(config.write_back_delay_ms),
        };
        let tiered = Arc::new(TieredCache::new(
            Arc::clone(&base),
            config.local_capacity,
            ttls,
            write_back,
        ));

        let adaptive = AdaptiveCacheManager::new(Arc::clone(&tiered), config.telemetry_capacity);
        let query = QueryCache::new(Arc::clone(&tiered), config.query_ttl);
        let limiter = SlidingWindowLimiter::new(shared);
        let cleanup = spawn_cleanup_task(Arc::clone(&tiered), config.cleanup_interval);

        info!(
            shared_connected = base.is_shared_connected(),
            local_capacity = config.local_capacity,
            "Cache engine started"
        );

        Self {
            config,
            base,
            tiered,
            adaptive,
            query,
            limiter,
            cleanup: Mutex::new(Some(cleanup)),
        }
    }

    // == Accessors ==
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base(&self) -> &Arc<BaseCache> {
        &self.base
    }

    pub fn tiered(&self) -> &Arc<TieredCache> {
        &self.tiered
    }

    pub fn adaptive(&self) -> &AdaptiveCacheManager {
        &self.adaptive
    }

    pub fn query(&self) -> &QueryCache {
        &self.query
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    // == Close ==
    /// Stops the cleanup task and shuts down the write-back queue.
    ///
    /// Queued write-backs are dropped; call `tiered().drain()` first to keep them.
    pub fn close(&self) {
        if let Some(cleanup) = self.cleanup.lock().take() {
            cleanup.abort();
        }
        let dropped = self.tiered.shutdown();
        info!(dropped_write_backs = dropped, "Cache engine closed");
    }
}
