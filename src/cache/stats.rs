//! Cache Statistics Module
//!
//! Local-store counters and the diagnostic snapshot returned by
//! `BaseCache::get_stats`.

use serde::Serialize;

use crate::cache::shared::ServerInfo;

// == Local Stats ==
/// Counters kept by a local store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocalStats {
    /// Number of successful local retrievals
    pub hits: u64,
    /// Number of failed local retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries removed by FIFO capacity eviction
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
}

impl LocalStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Cache Stats ==
/// Diagnostic snapshot of the base cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Entries currently held by the local fallback store
    pub local_cache_size: usize,
    /// Capacity of the local fallback store
    pub local_cache_max_size: usize,
    /// Local fallback store counters
    pub local: LocalStats,
    /// Whether a shared tier is configured
    pub shared_connected: bool,
    /// Shared tier server statistics, absent when degraded or INFO failed
    pub shared_server: Option<ServerInfo>,
}
