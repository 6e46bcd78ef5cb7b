//! Tiered Cache - multi-tier adaptive caching over Redis
//!
//! Provides a base cache with fail-open fallback to a local store, a tiered
//! cache with selectable write strategies, an adaptive manager driven by
//! access telemetry, query memoisation with entity invalidation, and a
//! sliding-window rate limiter.

pub mod adaptive;
pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod invalidation;
pub mod limiter;
pub mod models;
pub mod tasks;
pub mod tiered;

pub use adaptive::AdaptiveCacheManager;
pub use api::{create_router, AppState};
pub use cache::BaseCache;
pub use config::Config;
pub use engine::CacheEngine;
pub use error::{CacheError, Result};
pub use invalidation::QueryCache;
pub use limiter::{RateLimitRule, SlidingWindowLimiter};
pub use tasks::spawn_cleanup_task;
pub use tiered::{CacheTier, TieredCache, WriteStrategy};
