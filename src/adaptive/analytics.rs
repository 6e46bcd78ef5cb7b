//! Cache Analytics
//!
//! Diagnostic aggregate computed from access telemetry.

use std::collections::BTreeMap;

use serde::Serialize;

use super::telemetry::Telemetry;

/// Number of keys reported in `top_accessed_keys`.
pub const TOP_KEYS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyAccessCount {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEfficiency {
    /// Percentage (0-100)
    pub hit_rate: f64,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
}

// == Cache Analytics ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheAnalytics {
    /// Keys with at least one recorded hit or miss
    pub total_keys: usize,
    /// Percentage (0-100)
    pub hit_rate: f64,
    /// Percentage (0-100)
    pub miss_rate: f64,
    /// Mean of the per-key average response times
    pub avg_response_time_ms: f64,
    pub top_accessed_keys: Vec<KeyAccessCount>,
    pub cache_efficiency: BTreeMap<String, KeyEfficiency>,
}

impl CacheAnalytics {
    pub fn from_telemetry(telemetry: &Telemetry) -> Self {
        let mut analytics = Self::default();

        let (mut hits, mut misses, mut response_sum) = (0u64, 0u64, 0.0f64);
        for (key, entry) in telemetry.iter() {
            let stats = &entry.stats;
            if stats.total() == 0 {
                continue;
            }
            hits += stats.hits;
            misses += stats.misses;
            response_sum += stats.avg_response_ms;
            analytics.total_keys += 1;
            analytics.cache_efficiency.insert(
                key.clone(),
                KeyEfficiency {
                    hit_rate: stats.hit_rate(),
                    total_requests: stats.total(),
                    avg_response_time_ms: stats.avg_response_ms,
                },
            );
        }

        let requests = hits + misses;
        if requests > 0 {
            analytics.hit_rate = hits as f64 / requests as f64 * 100.0;
            analytics.miss_rate = misses as f64 / requests as f64 * 100.0;
        }
        if analytics.total_keys > 0 {
            analytics.avg_response_time_ms = response_sum / analytics.total_keys as f64;
        }

        let mut counts: Vec<KeyAccessCount> = telemetry
            .iter()
            .map(|(key, entry)| KeyAccessCount {
                key: key.clone(),
                count: entry.pattern.count,
            })
            .collect();
        // ties broken by key so the report is stable
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        counts.truncate(TOP_KEYS);
        analytics.top_accessed_keys = counts;

        analytics
    }
}
