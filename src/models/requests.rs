//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_RAW_KEY_CHARS;
use crate::tiered::{CacheTier, WriteStrategy, DEFAULT_TIERS};

/// Request body for the tiered set (PUT /cache)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (each tier's default if not specified)
/// - `tiers`: Optional tier order (local then shared if not specified)
/// - `strategy`: Optional write strategy (write-through if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub tiers: Option<Vec<CacheTier>>,
    #[serde(default)]
    pub strategy: Option<WriteStrategy>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.chars().count() > MAX_RAW_KEY_CHARS {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_RAW_KEY_CHARS
            ));
        }
        if matches!(&self.tiers, Some(tiers) if tiers.is_empty()) {
            return Some("Tier list cannot be empty".to_string());
        }
        None
    }

    pub fn tiers(&self) -> Vec<CacheTier> {
        self.tiers
            .clone()
            .unwrap_or_else(|| DEFAULT_TIERS.to_vec())
    }

    pub fn strategy(&self) -> WriteStrategy {
        self.strategy.unwrap_or_default()
    }
}

/// Query string for the pattern clear (DELETE /cache?pattern=...)
#[derive(Debug, Clone, Deserialize)]
pub struct ClearQuery {
    /// Glob pattern, e.g. `user:42:*`
    pub pattern: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": {"title": "hello"}}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, json!({"title": "hello"}));
        assert!(req.ttl.is_none());
        assert_eq!(req.tiers(), DEFAULT_TIERS.to_vec());
        assert_eq!(req.strategy(), WriteStrategy::WriteThrough);
    }

    #[test]
    fn test_set_request_with_options() {
        let json = r#"{"key": "test", "value": 1, "ttl": 60, "tiers": ["shared"], "strategy": "cache_aside"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl, Some(60));
        assert_eq!(req.tiers(), vec![CacheTier::Shared]);
        assert_eq!(req.strategy(), WriteStrategy::CacheAside);
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let json = r#"{"key": "test", "value": 1, "tiers": ["database"]}"#;
        assert!(serde_json::from_str::<SetRequest>(json).is_err());
    }

    #[test]
    fn test_validate() {
        let mut req: SetRequest = serde_json::from_str(r#"{"key": "", "value": null}"#).unwrap();
        assert!(req.validate().is_some());

        req.key = "k".repeat(MAX_RAW_KEY_CHARS + 1);
        assert!(req.validate().is_some());

        req.key = "valid_key".to_string();
        assert!(req.validate().is_none());

        req.tiers = Some(vec![]);
        assert!(req.validate().is_some());
    }
}
