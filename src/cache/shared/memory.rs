//! In-process shared tier.
//!
//! Implements the `SharedStore` operations over a mutex-guarded map. Every
//! operation runs under one lock, so the sliding-window step is atomic per
//! store just as a Redis MULTI/EXEC pipeline is.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use globset::Glob;
use parking_lot::Mutex;

use super::{ServerInfo, SharedStore};
use crate::cache::current_timestamp_ms;
use crate::error::{CacheError, Result};

#[derive(Debug)]
enum SlotData {
    Text(String),
    /// (score, member), unordered
    Window(Vec<(u64, String)>),
}

#[derive(Debug)]
struct Slot {
    data: SlotData,
    expires_at: Option<u64>,
}

impl Slot {
    fn is_live(&self, now_ms: u64) -> bool {
        self.expires_at.map_or(true, |at| now_ms < at)
    }
}

// == Memory Store ==
/// Shared-tier implementation that lives inside the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
    sequence: AtomicU64,
    commands: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = current_timestamp_ms();
        self.slots.lock().values().filter(|s| s.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::InvalidRequest(format!(
        "WRONGTYPE operation against key '{}' holding the wrong kind of value",
        key
    ))
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.count_command();
        let now = current_timestamp_ms();
        let mut slots = self.slots.lock();

        match slots.get(key) {
            Some(slot) if !slot.is_live(now) => {
                slots.remove(key);
                Ok(None)
            }
            Some(Slot {
                data: SlotData::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.count_command();
        let expires_at = current_timestamp_ms() + ttl_secs.max(1) * 1000;
        self.slots.lock().insert(
            key.to_string(),
            Slot {
                data: SlotData::Text(value.to_string()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        self.count_command();
        let now = current_timestamp_ms();
        let mut slots = self.slots.lock();
        let removed = keys
            .iter()
            .filter_map(|key| slots.remove(key))
            .filter(|slot| slot.is_live(now))
            .count();
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.count_command();
        let now = current_timestamp_ms();
        Ok(self
            .slots
            .lock()
            .get(key)
            .map_or(false, |slot| slot.is_live(now)))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.count_command();
        let matcher = Glob::new(pattern)?.compile_matcher();
        let now = current_timestamp_ms();
        Ok(self
            .slots
            .lock()
            .iter()
            .filter(|(key, slot)| slot.is_live(now) && matcher.is_match(key.as_str()))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn record_in_window(&self, key: &str, now_ms: u64, window_secs: u64) -> Result<u64> {
        self.count_command();
        let window_secs = window_secs.max(1);
        let window_ms = window_secs * 1000;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut slots = self.slots.lock();
        if slots.get(key).map_or(false, |slot| !slot.is_live(now_ms)) {
            slots.remove(key);
        }

        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            data: SlotData::Window(Vec::new()),
            expires_at: None,
        });
        let members = match &mut slot.data {
            SlotData::Window(members) => members,
            SlotData::Text(_) => return Err(wrong_type(key)),
        };

        // Drops scores at or before `now - window` without underflowing near zero
        members.retain(|(score, _)| score.saturating_add(window_ms) > now_ms);
        let count = members.len() as u64;
        members.push((now_ms, format!("{}-{}", now_ms, seq)));
        slot.expires_at = Some(now_ms + window_ms);

        Ok(count)
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        self.count_command();
        Ok(ServerInfo {
            used_memory: "N/A".to_string(),
            connected_clients: 1,
            total_commands_processed: self.commands.load(Ordering::Relaxed),
        })
    }
}
