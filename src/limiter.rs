//! Sliding Window Limiter
//!
//! Admission control over the shared tier's sorted-set primitives. Each key
//! holds the timestamps of its recent requests; a request is admitted when
//! fewer than `limit` timestamps fall inside the trailing window.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::cache::{current_timestamp_ms, SharedStore};

// == Rate Limit Rule ==
/// A `(limit, window)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Requests admitted per window
    pub limit: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

// == Sliding Window Limiter ==
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    shared: Option<Arc<dyn SharedStore>>,
}

impl SlidingWindowLimiter {
    /// Creates a limiter over the shared tier. With `None` every request is admitted.
    pub fn new(shared: Option<Arc<dyn SharedStore>>) -> Self {
        Self { shared }
    }

    // == Allow ==
    /// Returns true if a request for `key` is admitted now.
    pub async fn allow(&self, key: &str, limit: u64, window_secs: u64) -> bool {
        self.allow_at(key, limit, window_secs, current_timestamp_ms())
            .await
    }

    /// Checks `key` against a configured rule.
    pub async fn check(&self, key: &str, rule: &RateLimitRule) -> bool {
        self.allow(key, rule.limit, rule.window_secs).await
    }

    /// Admission check at an explicit time (Unix milliseconds).
    ///
    /// The request is recorded whether or not it is admitted, so a client that
    /// keeps retrying stays limited until it backs off for a full window.
    /// Fails open when the shared tier is absent or errors.
    pub async fn allow_at(&self, key: &str, limit: u64, window_secs: u64, now_ms: u64) -> bool {
        let Some(shared) = &self.shared else {
            return true;
        };

        match shared.record_in_window(key, now_ms, window_secs).await {
            Ok(count) => {
                let allowed = count < limit;
                if !allowed {
                    debug!(key = %key, count, limit, "Rate limit exceeded");
                }
                allowed
            }
            Err(e) => {
                error!(key = %key, error = %e, "Rate limiter error");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn memory_limiter() -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(Some(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_sliding_window_scenario() {
        let limiter = memory_limiter();

        assert!(limiter.allow_at("rl:client", 3, 10, 0).await);
        assert!(limiter.allow_at("rl:client", 3, 10, 1_000).await);
        assert!(limiter.allow_at("rl:client", 3, 10, 2_000).await);
        assert!(!limiter.allow_at("rl:client", 3, 10, 3_000).await);
        assert!(limiter.allow_at("rl:client", 3, 10, 11_000).await);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = memory_limiter();

        assert!(limiter.allow_at("a", 1, 10, 0).await);
        assert!(!limiter.allow_at("a", 1, 10, 1).await);
        assert!(limiter.allow_at("b", 1, 10, 1).await);
    }

    #[tokio::test]
    async fn test_same_millisecond_burst_is_counted() {
        let limiter = memory_limiter();

        assert!(limiter.allow_at("burst", 2, 10, 500).await);
        assert!(limiter.allow_at("burst", 2, 10, 500).await);
        assert!(!limiter.allow_at("burst", 2, 10, 500).await);
    }

    #[tokio::test]
    async fn test_zero_limit_rejects() {
        let limiter = memory_limiter();
        assert!(!limiter.allow("none", 0, 10).await);
    }

    #[tokio::test]
    async fn test_fails_open_without_shared_tier() {
        let limiter = SlidingWindowLimiter::new(None);
        for _ in 0..10 {
            assert!(limiter.allow("k", 1, 60).await);
        }
    }

    #[tokio::test]
    async fn test_check_uses_rule() {
        let limiter = memory_limiter();
        let rule = RateLimitRule {
            limit: 2,
            window_secs: 60,
        };

        assert!(limiter.check("ip:1", &rule).await);
        assert!(limiter.check("ip:1", &rule).await);
        assert!(!limiter.check("ip:1", &rule).await);
    }

    #[tokio::test]
    async fn test_concurrent_callers_admit_at_most_limit() {
        let limiter = memory_limiter();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.allow("hot", 5, 60).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }
}
