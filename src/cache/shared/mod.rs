//! Shared Tier Module
//!
//! The networked cache tier behind `BaseCache` and `SlidingWindowLimiter`.
//! `RedisStore` talks to Redis; `MemoryStore` provides the same operations
//! in-process for single-node deployments.

mod memory;
mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// URL scheme selecting the in-process shared store.
pub const MEMORY_URL_SCHEME: &str = "memory://";

// == Server Info ==
/// Subset of the shared tier's INFO output used for diagnostics.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ServerInfo {
    pub used_memory: String,
    pub connected_clients: u64,
    pub total_commands_processed: u64,
}

// == Shared Store ==
/// Operations the engine needs from the shared tier.
///
/// Implementations report failures as errors; callers in this crate convert
/// every error into a fail-open outcome.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// GET
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// SETEX
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// DEL; returns the number of keys removed
    async fn delete(&self, keys: &[String]) -> Result<usize>;

    /// EXISTS
    async fn exists(&self, key: &str) -> Result<bool>;

    /// KEYS with a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Sliding-window admission step, atomic per key.
    ///
    /// Removes members scored at or below `now_ms - window_secs * 1000`,
    /// counts the remainder, adds a member scored `now_ms` and sets the key
    /// TTL to `window_secs`. Returns the count taken before the insert.
    async fn record_in_window(&self, key: &str, now_ms: u64, window_secs: u64) -> Result<u64>;

    /// INFO
    async fn server_info(&self) -> Result<ServerInfo>;
}

// == Connect ==
/// Opens the shared tier named by `url`.
///
/// Returns `None` when the tier cannot be reached, which puts the engine in
/// degraded local-only mode instead of failing startup.
pub async fn connect(url: &str) -> Option<Arc<dyn SharedStore>> {
    if url.starts_with(MEMORY_URL_SCHEME) {
        info!("Using in-process shared store");
        return Some(Arc::new(MemoryStore::new()));
    }

    match RedisStore::connect(url).await {
        Ok(store) => {
            info!("Redis connection established");
            Some(Arc::new(store))
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to Redis, running in local-only mode");
            None
        }
    }
}
