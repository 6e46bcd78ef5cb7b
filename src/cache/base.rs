//! Base Cache Module
//!
//! get/set/delete/exists/pattern-clear over the shared tier with a bounded
//! local fallback store. Shared-tier errors are logged and turned into misses
//! or local writes; nothing here returns an error to the caller.

use std::sync::Arc;

use globset::Glob;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::shared::SharedStore;
use crate::cache::{CacheStats, LocalStore};

// == Base Cache ==
pub struct BaseCache {
    /// `None` when running in degraded local-only mode
    shared: Option<Arc<dyn SharedStore>>,
    local: Mutex<LocalStore>,
    default_ttl: u64,
}

impl BaseCache {
    // == Constructor ==
    /// Creates a base cache over an optional shared tier.
    ///
    /// # Arguments
    /// * `shared` - Shared tier, or `None` for local-only mode
    /// * `local_capacity` - Capacity of the local fallback store
    /// * `default_ttl` - TTL in seconds used when `set` is given none
    pub fn new(
        shared: Option<Arc<dyn SharedStore>>,
        local_capacity: usize,
        default_ttl: u64,
    ) -> Self {
        Self {
            shared,
            local: Mutex::new(LocalStore::new(local_capacity)),
            default_ttl,
        }
    }

    /// Creates a base cache that never touches a shared tier.
    pub fn local_only(local_capacity: usize, default_ttl: u64) -> Self {
        Self::new(None, local_capacity, default_ttl)
    }

    pub fn shared(&self) -> Option<&Arc<dyn SharedStore>> {
        self.shared.as_ref()
    }

    pub fn is_shared_connected(&self) -> bool {
        self.shared.is_some()
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    // == Get ==
    /// Returns the cached value, trying the shared tier first.
    ///
    /// A shared hit is JSON-decoded, or returned as a raw string if it is not
    /// valid JSON. A shared miss or error falls through to the local store.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(shared) = &self.shared {
            match shared.get(key).await {
                Ok(Some(raw)) => return Some(decode_value(raw)),
                Ok(None) => {}
                Err(e) => error!(key = %key, error = %e, "Cache get error"),
            }
        }

        self.local.lock().get(key)
    }

    /// Returns the cached value or `default`.
    pub async fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).await.unwrap_or(default)
    }

    // == Set ==
    /// Stores a value for `ttl` seconds (the default TTL when `None`).
    ///
    /// Writes the shared tier when one is configured; falls back to the local
    /// store when there is none or the write fails.
    pub async fn set(&self, key: &str, value: &Value, ttl: Option<u64>) {
        let ttl = ttl.unwrap_or(self.default_ttl).max(1);

        if let Some(shared) = &self.shared {
            match shared.set_ex(key, &encode_value(value), ttl).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache set error, writing local store")
                }
            }
        }

        self.local.lock().set(key.to_string(), value.clone(), ttl);
    }

    // == Delete ==
    /// Removes the key from both tiers. Returns true if either held it.
    pub async fn delete(&self, key: &str) -> bool {
        let mut removed = false;

        if let Some(shared) = &self.shared {
            match shared.delete(&[key.to_string()]).await {
                Ok(count) => removed = count > 0,
                Err(e) => error!(key = %key, error = %e, "Cache delete error"),
            }
        }

        let removed_local = self.local.lock().delete(key);
        removed || removed_local
    }

    // == Exists ==
    /// Returns true if the key is live in the shared tier, or, when the shared
    /// tier is absent or failing, in the local store.
    pub async fn exists(&self, key: &str) -> bool {
        if let Some(shared) = &self.shared {
            match shared.exists(key).await {
                Ok(found) => return found,
                Err(e) => error!(key = %key, error = %e, "Cache exists error"),
            }
        }

        self.local.lock().contains(key)
    }

    // == Clear Pattern ==
    /// Deletes every key matching a glob pattern in both tiers.
    ///
    /// Returns the total number of keys removed; an invalid pattern or a
    /// shared-tier error counts as zero for that tier.
    pub async fn clear_pattern(&self, pattern: &str) -> usize {
        let matcher = match Glob::new(pattern) {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                error!(pattern = %pattern, error = %e, "Cache clear pattern error");
                return 0;
            }
        };

        let mut count = 0;
        if let Some(shared) = &self.shared {
            match shared.keys(pattern).await {
                Ok(keys) => match shared.delete(&keys).await {
                    Ok(removed) => count += removed,
                    Err(e) => error!(pattern = %pattern, error = %e, "Cache clear pattern error"),
                },
                Err(e) => error!(pattern = %pattern, error = %e, "Cache clear pattern error"),
            }
        }

        count += self.local.lock().clear_matching(&matcher);
        debug!(pattern = %pattern, count, "Cleared cache pattern");
        count
    }

    // == Stats ==
    /// Returns a diagnostic snapshot of both tiers.
    pub async fn get_stats(&self) -> CacheStats {
        let (local_cache_size, local_cache_max_size, local) = {
            let store = self.local.lock();
            (store.len(), store.capacity(), store.stats())
        };

        let shared_server = match &self.shared {
            Some(shared) => match shared.server_info().await {
                Ok(info) => Some(info),
                Err(e) => {
                    error!(error = %e, "Failed to get shared tier stats");
                    None
                }
            },
            None => None,
        };

        CacheStats {
            local_cache_size,
            local_cache_max_size,
            local,
            shared_connected: self.shared.is_some(),
            shared_server,
        }
    }

    /// Removes expired entries from the local store.
    pub fn purge_expired(&self) -> usize {
        self.local.lock().cleanup_expired()
    }
}

// == Value Encoding ==
/// Encodes a value for the shared tier.
///
/// Maps and lists are JSON-encoded; strings are stored raw; other scalars use
/// their JSON text form.
pub(crate) fn encode_value(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes a shared-tier payload, returning the raw string if it is not JSON.
pub(crate) fn decode_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
