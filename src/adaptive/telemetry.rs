//! Access Telemetry
//!
//! Per-key access history and hit/miss counters. The number of tracked keys is
//! bounded; the least recently accessed key is dropped first.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

/// Access timestamps kept per key.
pub const MAX_ACCESS_HISTORY: usize = 100;

// == Access Pattern ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessPattern {
    /// Total accesses observed
    pub count: u64,
    /// Unix milliseconds of the latest access
    pub last_access_ms: u64,
    #[serde(skip)]
    history: VecDeque<u64>,
}

impl AccessPattern {
    pub fn record(&mut self, at_ms: u64) {
        self.count += 1;
        self.last_access_ms = at_ms;
        self.history.push_back(at_ms);
        if self.history.len() > MAX_ACCESS_HISTORY {
            self.history.pop_front();
        }
    }

    /// Mean gap between consecutive recorded accesses, in seconds.
    ///
    /// `None` with fewer than two observations.
    pub fn mean_interval_secs(&self) -> Option<f64> {
        if self.history.len() < 2 {
            return None;
        }
        let (first, last) = (self.history.front()?, self.history.back()?);
        let span_ms = last.saturating_sub(*first) as f64;
        Some(span_ms / (self.history.len() - 1) as f64 / 1000.0)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

// == Key Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyStats {
    pub hits: u64,
    pub misses: u64,
    /// Running mean of observed response times
    pub avg_response_ms: f64,
}

impl KeyStats {
    pub fn record(&mut self, hit: bool, elapsed_ms: f64) {
        let observed = self.total() as f64;
        self.avg_response_ms = (self.avg_response_ms * observed + elapsed_ms) / (observed + 1.0);
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit percentage (0-100), or 0 with no observations.
    pub fn hit_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.hits as f64 / total as f64 * 100.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyTelemetry {
    pub pattern: AccessPattern,
    pub stats: KeyStats,
}

// == Telemetry ==
/// Recency-bounded telemetry store.
#[derive(Debug)]
pub struct Telemetry {
    keys: LruCache<String, KeyTelemetry>,
}

impl Telemetry {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            keys: LruCache::new(capacity),
        }
    }

    // == Record Access ==
    /// Records an access and returns the key's updated pattern.
    pub fn record_access(&mut self, key: &str, at_ms: u64) -> &AccessPattern {
        if !self.keys.contains(key) && self.keys.len() >= self.keys.cap().get() {
            if let Some((evicted, _)) = self.keys.pop_lru() {
                debug!(key = %evicted, "Dropped telemetry for least recently accessed key");
            }
        }

        let telemetry = self
            .keys
            .get_or_insert_mut(key.to_string(), KeyTelemetry::default);
        telemetry.pattern.record(at_ms);
        &telemetry.pattern
    }

    // == Record Result ==
    pub fn record_result(&mut self, key: &str, hit: bool, elapsed_ms: f64) {
        if let Some(telemetry) = self.keys.peek_mut(key) {
            telemetry.stats.record(hit, elapsed_ms);
        }
    }

    /// Looks a key up without changing its recency.
    pub fn get(&self, key: &str) -> Option<&KeyTelemetry> {
        self.keys.peek(key)
    }

    /// Iterates from the most to the least recently accessed key.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeyTelemetry)> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
