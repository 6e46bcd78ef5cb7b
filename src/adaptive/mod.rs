//! Adaptive Cache Manager
//!
//! Wraps `TieredCache` with per-key access telemetry. On a miss the loaded
//! value is written back with a strategy, tier set and TTL chosen from how
//! often and how densely the key has been accessed.

mod analytics;
mod telemetry;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::cache::current_timestamp_ms;
use crate::tiered::{CacheTier, TieredCache, WriteStrategy, DEFAULT_TIERS};

pub use analytics::{CacheAnalytics, KeyAccessCount, KeyEfficiency, TOP_KEYS};
pub use telemetry::{AccessPattern, KeyStats, KeyTelemetry, Telemetry, MAX_ACCESS_HISTORY};

/// TTL used until a key has two observed accesses.
pub const DEFAULT_ADAPTIVE_TTL: u64 = 1800;

// == Policy ==
/// Write strategy for a key accessed `count` times.
pub fn choose_strategy(count: u64) -> WriteStrategy {
    if count > 100 {
        WriteStrategy::WriteThrough
    } else if count > 10 {
        WriteStrategy::WriteBack
    } else {
        WriteStrategy::CacheAside
    }
}

/// Tiers written for a key accessed `count` times.
pub fn choose_tiers(count: u64) -> Vec<CacheTier> {
    if count > 50 {
        vec![CacheTier::Local, CacheTier::Shared]
    } else {
        vec![CacheTier::Shared]
    }
}

/// TTL in seconds for a mean inter-access interval in seconds.
pub fn ttl_for_mean_interval(mean_interval_secs: Option<f64>) -> u64 {
    match mean_interval_secs {
        None => DEFAULT_ADAPTIVE_TTL,
        Some(secs) if secs < 60.0 => 300,
        Some(secs) if secs < 300.0 => 900,
        Some(secs) if secs < 1800.0 => 3600,
        Some(_) => 7200,
    }
}

// == Adaptive Cache Manager ==
pub struct AdaptiveCacheManager {
    tiered: Arc<TieredCache>,
    telemetry: Mutex<Telemetry>,
}

impl AdaptiveCacheManager {
    /// Creates a manager tracking at most `telemetry_capacity` keys.
    pub fn new(tiered: Arc<TieredCache>, telemetry_capacity: usize) -> Self {
        Self {
            tiered,
            telemetry: Mutex::new(Telemetry::new(telemetry_capacity)),
        }
    }

    pub fn tiered(&self) -> &Arc<TieredCache> {
        &self.tiered
    }

    // == Get Or Load ==
    /// Returns the cached value, or loads and caches it on a miss.
    ///
    /// A `None` from the loader is returned as-is and nothing is cached.
    /// Loader errors are returned to the caller untouched.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, loader: F) -> Result<Option<Value>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Value>, E>>,
    {
        let started = Instant::now();
        let (count, mean_interval) = {
            let mut telemetry = self.telemetry.lock();
            let pattern = telemetry.record_access(key, current_timestamp_ms());
            (pattern.count, pattern.mean_interval_secs())
        };

        if let Some(value) = self.tiered.get(key, &DEFAULT_TIERS).await {
            self.record_result(key, true, started);
            return Ok(Some(value));
        }

        let loaded = loader().await?;
        if let Some(value) = &loaded {
            let strategy = choose_strategy(count);
            let tiers = choose_tiers(count);
            let ttl = ttl_for_mean_interval(mean_interval);
            debug!(key = %key, count, ?strategy, ?tiers, ttl, "Caching loaded value");
            self.tiered
                .set(key, value, Some(ttl), &tiers, strategy)
                .await;
        }

        self.record_result(key, false, started);
        Ok(loaded)
    }

    fn record_result(&self, key: &str, hit: bool, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.telemetry.lock().record_result(key, hit, elapsed_ms);
    }

    // == Analytics ==
    pub fn get_analytics(&self) -> CacheAnalytics {
        CacheAnalytics::from_telemetry(&self.telemetry.lock())
    }

    /// Number of keys with telemetry.
    pub fn tracked_keys(&self) -> usize {
        self.telemetry.lock().len()
    }
}
