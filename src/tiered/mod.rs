//! Tiered Cache Module
//!
//! An ordered list of cache tiers consulted fastest first. Reads backfill the
//! tiers in front of the one that hit; writes propagate according to a
//! `WriteStrategy`.

mod write_back;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{BaseCache, LocalStore};

pub use write_back::{WriteBackConfig, WriteBackJob, WriteBackQueue};

// == Cache Tier ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// In-process store owned by the tiered cache
    Local,
    /// `BaseCache`, the shared tier with its own local fallback
    Shared,
}

/// Tier order used when the caller supplies none.
pub const DEFAULT_TIERS: [CacheTier; 2] = [CacheTier::Local, CacheTier::Shared];

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Local => "local",
            CacheTier::Shared => "shared",
        }
    }
}

// == Write Strategy ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Write every listed tier before returning
    #[default]
    WriteThrough,
    /// Write the first tier now and the rest after a short delay
    WriteBack,
    /// Write nothing and invalidate every listed tier
    WriteAround,
    /// Write the first tier only
    CacheAside,
}

// == Tier TTLs ==
/// Default TTL in seconds per tier, used for backfill and untimed writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierTtls {
    pub local: u64,
    pub shared: u64,
}

impl TierTtls {
    pub fn for_tier(&self, tier: CacheTier) -> u64 {
        match tier {
            CacheTier::Local => self.local,
            CacheTier::Shared => self.shared,
        }
    }
}

impl Default for TierTtls {
    fn default() -> Self {
        Self {
            local: 300,
            shared: 1800,
        }
    }
}

// == Tiers ==
/// Per-tier read/write/remove, shared with the write-back worker.
#[derive(Clone)]
pub(crate) struct Tiers {
    local: Arc<Mutex<LocalStore>>,
    base: Arc<BaseCache>,
    ttls: TierTtls,
}

impl Tiers {
    async fn read(&self, tier: CacheTier, key: &str) -> Option<Value> {
        match tier {
            CacheTier::Local => {
                let value = self.local.lock().get(key);
                value
            }
            CacheTier::Shared => self.base.get(key).await,
        }
    }

    pub(crate) async fn write(&self, tier: CacheTier, key: &str, value: &Value, ttl: Option<u64>) {
        let ttl = ttl.unwrap_or_else(|| self.ttls.for_tier(tier));
        match tier {
            CacheTier::Local => {
                self.local.lock().set(key.to_string(), value.clone(), ttl);
            }
            CacheTier::Shared => self.base.set(key, value, Some(ttl)).await,
        }
    }

    async fn remove(&self, tier: CacheTier, key: &str) -> bool {
        match tier {
            CacheTier::Local => {
                let removed = self.local.lock().delete(key);
                removed
            }
            CacheTier::Shared => self.base.delete(key).await,
        }
    }
}

// == Tiered Cache ==
pub struct TieredCache {
    tiers: Tiers,
    write_back: WriteBackQueue,
}

impl TieredCache {
    // == Constructor ==
    /// Creates a tiered cache over `base` with its own local tier.
    ///
    /// Spawns the write-back worker, so it must be called inside a tokio runtime.
    pub fn new(
        base: Arc<BaseCache>,
        local_capacity: usize,
        ttls: TierTtls,
        write_back: WriteBackConfig,
    ) -> Self {
        let tiers = Tiers {
            local: Arc::new(Mutex::new(LocalStore::new(local_capacity))),
            base,
            ttls,
        };
        let write_back = WriteBackQueue::spawn(tiers.clone(), write_back);
        Self { tiers, write_back }
    }

    pub fn base(&self) -> &Arc<BaseCache> {
        &self.tiers.base
    }

    pub fn ttls(&self) -> TierTtls {
        self.tiers.ttls
    }

    // == Get ==
    /// Returns the value from the first tier that holds it.
    ///
    /// Every tier in front of the hit tier is backfilled with that tier's
    /// default TTL before returning.
    pub async fn get(&self, key: &str, tiers: &[CacheTier]) -> Option<Value> {
        for (position, tier) in tiers.iter().enumerate() {
            if let Some(value) = self.tiers.read(*tier, key).await {
                for earlier in &tiers[..position] {
                    self.tiers.write(*earlier, key, &value, None).await;
                }
                if position > 0 {
                    debug!(key = %key, hit = tier.as_str(), backfilled = position, "Tiered backfill");
                }
                return Some(value);
            }
        }
        None
    }

    // == Set ==
    /// Writes `value` into `tiers` following `strategy`.
    ///
    /// `ttl` applies to every tier written; `None` uses each tier's default.
    pub async fn set(
        &self,
        key: &str,
        value: &Value,
        ttl: Option<u64>,
        tiers: &[CacheTier],
        strategy: WriteStrategy,
    ) {
        let Some((first, rest)) = tiers.split_first() else {
            return;
        };
        if strategy != WriteStrategy::WriteBack {
            self.write_back.cancel(key);
        }

        match strategy {
            WriteStrategy::WriteThrough => {
                for tier in tiers {
                    self.tiers.write(*tier, key, value, ttl).await;
                }
            }
            WriteStrategy::WriteBack => {
                self.tiers.write(*first, key, value, ttl).await;
                if rest.is_empty() {
                    return;
                }
                let queued =
                    self.write_back
                        .enqueue(key.to_string(), value.clone(), ttl, rest.to_vec());
                if let Err(job) = queued {
                    warn!(key = %key, "Write-back unavailable, writing synchronously");
                    for tier in &job.tiers {
                        self.tiers.write(*tier, &job.key, &job.value, job.ttl).await;
                    }
                }
            }
            WriteStrategy::WriteAround => {
                self.invalidate(key, tiers).await;
            }
            WriteStrategy::CacheAside => {
                self.tiers.write(*first, key, value, ttl).await;
            }
        }
    }

    // == Invalidate ==
    /// Removes the key from every listed tier. Returns true if any tier held it.
    pub async fn invalidate(&self, key: &str, tiers: &[CacheTier]) -> bool {
        self.write_back.cancel(key);
        let mut removed = false;
        for tier in tiers {
            removed |= self.tiers.remove(*tier, key).await;
        }
        removed
    }

    // == Clear Pattern ==
    /// Clears glob-matching keys from the local tier and the base cache, and
    /// cancels their queued write-backs.
    pub async fn clear_pattern(&self, pattern: &str) -> usize {
        let local = match globset::Glob::new(pattern) {
            Ok(glob) => {
                let matcher = glob.compile_matcher();
                let cancelled = self.write_back.cancel_matching(&matcher);
                if cancelled > 0 {
                    debug!(pattern = %pattern, cancelled, "Cancelled queued write-backs");
                }
                self.tiers.local.lock().clear_matching(&matcher)
            }
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Invalid pattern for local tier");
                0
            }
        };
        local + self.tiers.base.clear_pattern(pattern).await
    }

    /// Removes expired entries from the local tier.
    pub fn purge_expired(&self) -> usize {
        self.tiers.local.lock().cleanup_expired()
    }

    /// Number of live entries held by the local tier.
    pub fn local_len(&self) -> usize {
        self.tiers.local.lock().len()
    }

    // == Write-Back Control ==
    /// Waits until all deferred writes have been applied.
    pub async fn drain(&self) {
        self.write_back.drain().await;
    }

    /// Cancels deferred writes. Later write-back sets are written synchronously.
    pub fn shutdown(&self) -> usize {
        self.write_back.shutdown()
    }

    pub fn pending_write_backs(&self) -> usize {
        self.write_back.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, SharedStore};
    use serde_json::json;
    use std::time::Duration;

    fn tiered_with_memory(delay_ms: u64) -> (TieredCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn SharedStore> = store.clone();
        let base = Arc::new(BaseCache::new(Some(shared), 100, 3600));
        let config = WriteBackConfig {
            capacity: 16,
            delay: Duration::from_millis(delay_ms),
        };
        (
            TieredCache::new(base, 100, TierTtls::default(), config),
            store,
        )
    }

    #[tokio::test]
    async fn test_get_backfills_earlier_tiers() {
        let (cache, _) = tiered_with_memory(10);
        cache.base().set("k", &json!({"v": 1}), Some(60)).await;

        assert_eq!(cache.local_len(), 0);
        assert_eq!(cache.get("k", &DEFAULT_TIERS).await, Some(json!({"v": 1})));

        // The local tier now answers on its own
        assert_eq!(cache.get("k", &[CacheTier::Local]).await, Some(json!({"v": 1})));
        assert_eq!(cache.local_len(), 1);
    }

    #[tokio::test]
    async fn test_get_miss_in_all_tiers() {
        let (cache, _) = tiered_with_memory(10);
        assert_eq!(cache.get("missing", &DEFAULT_TIERS).await, None);
        assert_eq!(cache.get("missing", &[]).await, None);
    }

    #[tokio::test]
    async fn test_write_through_writes_every_tier() {
        let (cache, store) = tiered_with_memory(10);
        cache
            .set("k", &json!("v"), None, &DEFAULT_TIERS, WriteStrategy::WriteThrough)
            .await;

        assert_eq!(cache.local_len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_write_back_visible_after_drain() {
        let (cache, store) = tiered_with_memory(50);
        cache
            .set("k", &json!([1, 2]), Some(60), &DEFAULT_TIERS, WriteStrategy::WriteBack)
            .await;

        assert_eq!(cache.local_len(), 1);
        assert_eq!(cache.pending_write_backs(), 1);
        assert!(store.is_empty());

        cache.drain().await;

        assert_eq!(cache.pending_write_backs(), 0);
        assert_eq!(cache.get("k", &[CacheTier::Shared]).await, Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_invalidate_cancels_queued_write_back() {
        let (cache, store) = tiered_with_memory(50);
        cache
            .set("k", &json!("v1"), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
            .await;

        cache.invalidate("k", &DEFAULT_TIERS).await;
        cache.drain().await;

        assert_eq!(cache.get("k", &DEFAULT_TIERS).await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clear_pattern_cancels_queued_write_backs() {
        let (cache, store) = tiered_with_memory(50);
        for key in ["user:1:a", "user:2:a"] {
            cache
                .set(key, &json!(1), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
                .await;
        }

        cache.clear_pattern("user:1:*").await;
        cache.drain().await;

        assert!(!store.exists("user:1:a").await.unwrap());
        assert!(store.exists("user:2:a").await.unwrap());
    }

    #[tokio::test]
    async fn test_newer_write_supersedes_queued_write_back() {
        let (cache, store) = tiered_with_memory(50);
        cache
            .set("k", &json!("stale"), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
            .await;
        cache
            .set("k", &json!("fresh"), None, &DEFAULT_TIERS, WriteStrategy::WriteThrough)
            .await;
        cache.drain().await;

        assert_eq!(store.len(), 1);
        assert_eq!(cache.get("k", &[CacheTier::Shared]).await, Some(json!("fresh")));

        cache
            .set("k", &json!("a"), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
            .await;
        cache
            .set("k", &json!("b"), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
            .await;
        cache.drain().await;
        assert_eq!(cache.get("k", &[CacheTier::Shared]).await, Some(json!("b")));
    }

    #[tokio::test]
    async fn test_write_back_after_shutdown_is_synchronous() {
        let (cache, store) = tiered_with_memory(10_000);
        cache
            .set("queued", &json!(1), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
            .await;

        assert_eq!(cache.shutdown(), 1);
        assert_eq!(cache.pending_write_backs(), 0);
        // drain returns immediately once the queue is shut down
        cache.drain().await;

        cache
            .set("later", &json!(2), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
            .await;
        assert_eq!(store.len(), 1);
        assert!(store.exists("later").await.unwrap());
    }

    #[tokio::test]
    async fn test_full_queue_writes_synchronously() {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn SharedStore> = store.clone();
        let base = Arc::new(BaseCache::new(Some(shared), 10, 3600));
        let config = WriteBackConfig {
            capacity: 1,
            delay: Duration::from_secs(10),
        };
        let cache = TieredCache::new(base, 10, TierTtls::default(), config);

        for i in 0..5 {
            cache
                .set(&format!("k{}", i), &json!(i), None, &DEFAULT_TIERS, WriteStrategy::WriteBack)
                .await;
        }

        // At most two jobs are held back: one in the worker, one in the channel
        assert!(store.len() >= 3);
        assert_eq!(cache.local_len(), 5);
        cache.shutdown();
    }

    #[tokio::test]
    async fn test_write_around_invalidates() {
        let (cache, store) = tiered_with_memory(10);
        cache
            .set("k", &json!("old"), None, &DEFAULT_TIERS, WriteStrategy::WriteThrough)
            .await;

        cache
            .set("k", &json!("new"), None, &DEFAULT_TIERS, WriteStrategy::WriteAround)
            .await;

        assert_eq!(cache.get("k", &DEFAULT_TIERS).await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cache_aside_writes_first_tier_only() {
        let (cache, store) = tiered_with_memory(10);
        cache
            .set("k", &json!(7), None, &[CacheTier::Shared, CacheTier::Local], WriteStrategy::CacheAside)
            .await;

        assert_eq!(store.len(), 1);
        assert_eq!(cache.local_len(), 0);
        assert_eq!(cache.pending_write_backs(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear_pattern() {
        let (cache, _) = tiered_with_memory(10);
        for key in ["user:1:a", "user:1:b", "user:2:a"] {
            cache
                .set(key, &json!(1), None, &DEFAULT_TIERS, WriteStrategy::WriteThrough)
                .await;
        }

        assert!(cache.invalidate("user:2:a", &DEFAULT_TIERS).await);
        assert!(!cache.invalidate("user:2:a", &DEFAULT_TIERS).await);

        // two local entries plus two shared entries
        assert_eq!(cache.clear_pattern("user:1:*").await, 4);
        assert_eq!(cache.local_len(), 0);
    }

    #[test]
    fn test_tier_serde_names() {
        assert_eq!(serde_json::to_string(&CacheTier::Local).unwrap(), "\"local\"");
        let strategy: WriteStrategy = serde_json::from_str("\"write_back\"").unwrap();
        assert_eq!(strategy, WriteStrategy::WriteBack);
        assert_eq!(TierTtls::default().for_tier(CacheTier::Shared), 1800);
    }
}
