//! Query Cache
//!
//! Read-through caching for query results plus the entity invalidation
//! helpers. Invalidation clears through `TieredCache` so neither the tiered
//! local store nor the base cache keeps a stale copy.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::cache::KeyBuilder;
use crate::tiered::TieredCache;

pub struct QueryCache {
    tiered: Arc<TieredCache>,
    default_ttl: u64,
}

impl QueryCache {
    /// `default_ttl` applies when `get_or_set` is given no TTL.
    pub fn new(tiered: Arc<TieredCache>, default_ttl: u64) -> Self {
        Self {
            tiered,
            default_ttl,
        }
    }

    // == Get Or Set ==
    /// Returns the cached result for `key`, or awaits `loader` and caches its output.
    pub async fn get_or_set<F, Fut, E>(&self, key: &str, loader: F, ttl: Option<u64>) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let base = self.tiered.base();
        if let Some(value) = base.get(key).await {
            return Ok(value);
        }

        let value = loader().await?;
        base.set(key, &value, Some(ttl.unwrap_or(self.default_ttl)))
            .await;
        Ok(value)
    }

    /// Caches a function result under a key built from its arguments.
    pub async fn cached<F, Fut, E>(&self, key: KeyBuilder, ttl: u64, loader: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        self.get_or_set(&key.build(), loader, Some(ttl)).await
    }

    // == Invalidation ==
    /// Clears every cache entry owned by a user.
    pub async fn invalidate_user(&self, user_id: impl std::fmt::Display) -> usize {
        let patterns = [
            format!("user:{}:*", user_id),
            format!("prompts:user:{}:*", user_id),
            format!("templates:user:{}:*", user_id),
            format!("analyses:user:{}:*", user_id),
        ];
        let removed = self.clear_all(&patterns).await;
        info!(user_id = %user_id, removed, "Invalidated user cache");
        removed
    }

    /// Clears cached data for one prompt and its analyses.
    pub async fn invalidate_prompt(&self, prompt_id: impl std::fmt::Display) -> usize {
        let patterns = [
            format!("prompt:{}:*", prompt_id),
            format!("analyses:prompt:{}:*", prompt_id),
        ];
        let removed = self.clear_all(&patterns).await;
        info!(prompt_id = %prompt_id, removed, "Invalidated prompt cache");
        removed
    }

    /// Clears cached data for one template and every template listing.
    pub async fn invalidate_template(&self, template_id: impl std::fmt::Display) -> usize {
        let patterns = [
            format!("template:{}:*", template_id),
            "templates:*".to_string(),
        ];
        let removed = self.clear_all(&patterns).await;
        info!(template_id = %template_id, removed, "Invalidated template cache");
        removed
    }

    async fn clear_all(&self, patterns: &[String]) -> usize {
        let mut removed = 0;
        for pattern in patterns {
            removed += self.tiered.clear_pattern(pattern).await;
        }
        removed
    }
}
