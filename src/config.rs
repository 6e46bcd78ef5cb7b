//! Configuration Module
//!
//! Handles loading engine and server configuration from environment variables.
//! Values are read once at startup and are not reloaded.

use std::env;
use std::str::FromStr;

use crate::limiter::RateLimitRule;

/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared tier URL; `memory://` selects the in-process store
    pub redis_url: String,
    /// Maximum number of entries each local store can hold
    pub local_capacity: usize,
    /// Default TTL in seconds for plain `BaseCache::set` callers
    pub default_ttl: u64,
    /// Default TTL in seconds for the local tier
    pub local_tier_ttl: u64,
    /// Default TTL in seconds for the shared tier
    pub shared_tier_ttl: u64,
    /// Default TTL in seconds for memoised queries
    pub query_ttl: u64,
    /// Delay before deferred write-back writes run, in milliseconds
    pub write_back_delay_ms: u64,
    /// Maximum number of queued write-back jobs
    pub write_back_queue: usize,
    /// Maximum number of keys tracked by access telemetry
    pub telemetry_capacity: usize,
    /// Admission rule applied to the diagnostics service
    pub rate_limit: RateLimitRule,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Shared tier URL (default: redis://127.0.0.1:6379/0)
    /// - `LOCAL_CACHE_SIZE` - Local store capacity (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Base cache TTL in seconds (default: 3600)
    /// - `LOCAL_TIER_TTL` - Local tier TTL in seconds (default: 300)
    /// - `SHARED_TIER_TTL` - Shared tier TTL in seconds (default: 1800)
    /// - `QUERY_CACHE_TTL` - Query memoisation TTL in seconds (default: 1800)
    /// - `WRITE_BACK_DELAY_MS` - Write-back delay (default: 100)
    /// - `WRITE_BACK_QUEUE` - Write-back queue bound (default: 1024)
    /// - `TELEMETRY_CAPACITY` - Tracked keys (default: 10000)
    /// - `RATE_LIMIT_REQUESTS` - Requests per window (default: 100)
    /// - `RATE_LIMIT_WINDOW` - Window length in seconds (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            local_capacity: env_or("LOCAL_CACHE_SIZE", defaults.local_capacity),
            default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.default_ttl),
            local_tier_ttl: env_or("LOCAL_TIER_TTL", defaults.local_tier_ttl),
            shared_tier_ttl: env_or("SHARED_TIER_TTL", defaults.shared_tier_ttl),
            query_ttl: env_or("QUERY_CACHE_TTL", defaults.query_ttl),
            write_back_delay_ms: env_or("WRITE_BACK_DELAY_MS", defaults.write_back_delay_ms),
            write_back_queue: env_or("WRITE_BACK_QUEUE", defaults.write_back_queue),
            telemetry_capacity: env_or("TELEMETRY_CAPACITY", defaults.telemetry_capacity),
            rate_limit: RateLimitRule {
                limit: env_or("RATE_LIMIT_REQUESTS", defaults.rate_limit.limit),
                window_secs: env_or("RATE_LIMIT_WINDOW", defaults.rate_limit.window_secs),
            },
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            local_capacity: 1000,
            default_ttl: 3600,
            local_tier_ttl: 300,
            shared_tier_ttl: 1800,
            query_ttl: 1800,
            write_back_delay_ms: 100,
            write_back_queue: 1024,
            telemetry_capacity: 10_000,
            rate_limit: RateLimitRule {
                limit: 100,
                window_secs: 60,
            },
            server_port: 3000,
            cleanup_interval: 5,
        }
    }
}

/// Parses an environment variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.local_capacity, 1000);
        assert_eq!(config.local_tier_ttl, 300);
        assert_eq!(config.shared_tier_ttl, 1800);
        assert_eq!(config.write_back_delay_ms, 100);
        assert_eq!(config.rate_limit.limit, 100);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("LOCAL_CACHE_SIZE");
        env::remove_var("LOCAL_TIER_TTL");
        env::remove_var("SERVER_PORT");
        env::remove_var("TELEMETRY_CAPACITY");

        let config = Config::from_env();
        assert_eq!(config.local_capacity, 1000);
        assert_eq!(config.local_tier_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.telemetry_capacity, 10_000);
    }

    #[test]
    fn test_env_or_ignores_malformed_values() {
        env::set_var("TIERED_CACHE_TEST_MALFORMED", "not-a-number");
        assert_eq!(env_or("TIERED_CACHE_TEST_MALFORMED", 7u64), 7);
        env::set_var("TIERED_CACHE_TEST_MALFORMED", "42");
        assert_eq!(env_or("TIERED_CACHE_TEST_MALFORMED", 7u64), 42);
        env::remove_var("TIERED_CACHE_TEST_MALFORMED");
    }
}
