//! Cache Module
//!
//! Key construction, the local store, the shared-tier seam and `BaseCache`,
//! which combines them with fail-open semantics.

mod base;
mod entry;
mod key;
mod local;
pub mod shared;
mod stats;


// Re-export public types
pub use base::BaseCache;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use key::{hashed_key, make_key, KeyBuilder, MAX_RAW_KEY_CHARS};
pub use local::LocalStore;
pub use shared::{MemoryStore, RedisStore, ServerInfo, SharedStore};
pub use stats::{CacheStats, LocalStats};
