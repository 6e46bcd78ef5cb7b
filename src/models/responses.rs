//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::tiered::{CacheTier, WriteStrategy};

/// Response body for the tiered get (GET /cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the tiered set (PUT /cache)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    pub tiers: Vec<CacheTier>,
    pub strategy: WriteStrategy,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, tiers: Vec<CacheTier>, strategy: WriteStrategy) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            tiers,
            strategy,
        }
    }
}

/// Response body for the invalidation (DELETE /cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    /// Whether any tier held the key
    pub removed: bool,
}

/// Response body for the pattern clear (DELETE /cache?pattern=...)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub pattern: String,
    /// Keys removed across all tiers
    pub removed: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Base cache snapshot
    pub cache: CacheStats,
    /// Entries held by the tiered cache's local tier
    pub tiered_local_size: usize,
    /// Deferred writes not yet applied
    pub pending_write_backs: usize,
    pub timestamp: String,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" without a shared tier
    pub status: String,
    pub shared_connected: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(shared_connected: bool) -> Self {
        let status = if shared_connected { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            shared_connected,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_response_serialize() {
        let resp = GetResponse::new("test_key", json!({"n": 1}));
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"key":"test_key","value":{"n":1}}"#);
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key", vec![CacheTier::Local], WriteStrategy::WriteBack);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("successfully"));
        assert!(json.contains(r#""tiers":["local"]"#));
        assert!(json.contains(r#""strategy":"write_back""#));
    }

    #[test]
    fn test_health_response_status() {
        assert_eq!(HealthResponse::new(true).status, "healthy");

        let resp = HealthResponse::new(false);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("degraded"));
        assert!(json.contains("timestamp"));
    }
}
