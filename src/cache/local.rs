//! Local Store Module
//!
//! Bounded in-process store with lazily-checked TTL expiry and FIFO eviction.
//! Used as the fallback behind the shared tier and as the local tier of
//! `TieredCache`.

use std::collections::{BTreeMap, HashMap};

use globset::GlobMatcher;
use serde_json::Value;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheEntry, LocalStats};

/// An entry plus its position in write order.
#[derive(Debug)]
struct Slot {
    seq: u64,
    entry: CacheEntry,
}

// == Local Store ==
/// Local key-value storage with TTL support and insertion-order eviction.
///
/// Reads never change eviction order: under capacity pressure the entry with
/// the oldest write is removed, not the least recently read.
#[derive(Debug)]
pub struct LocalStore {
    /// Key-value storage
    entries: HashMap<String, Slot>,
    /// Write sequence to key, first = oldest write
    written: BTreeMap<u64, String>,
    next_seq: u64,
    stats: LocalStats,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl LocalStore {
    // == Constructor ==
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            written: BTreeMap::new(),
            next_seq: 0,
            stats: LocalStats::new(),
            capacity,
        }
    }

    // == Set ==
    /// Stores a value for `ttl` seconds.
    ///
    /// Overwriting a key resets its TTL and makes it the newest entry. When a
    /// new key arrives at capacity, expired entries are purged first; if the
    /// store is still full the oldest-written entry is evicted.
    pub fn set(&mut self, key: String, value: Value, ttl: u64) {
        if self.capacity == 0 {
            debug!(key = %key, "Local store has zero capacity, dropping write");
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.cleanup_expired();

            if self.entries.len() >= self.capacity {
                if let Some((_, evicted)) = self.written.pop_first() {
                    self.entries.remove(&evicted);
                    self.stats.record_eviction();
                    debug!(key = %evicted, "Evicted oldest local entry");
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = Slot {
            seq,
            entry: CacheEntry::new(value, ttl.max(1)),
        };
        if let Some(previous) = self.entries.insert(key.clone(), slot) {
            self.written.remove(&previous.seq);
        }
        self.written.insert(seq, key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the value if present and not expired. Expired entries are removed.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = current_timestamp_ms();
        match self.entries.get(key) {
            Some(slot) if !slot.entry.is_expired_at(now) => {
                let value = slot.entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            Some(_) => {
                self.remove_entry(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Contains ==
    /// Returns true if a live entry exists. Expired entries are removed.
    pub fn contains(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(slot) if slot.entry.is_expired() => {
                self.remove_entry(key);
                self.stats.record_expirations(1);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Delete ==
    /// Removes an entry. Returns true if it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    // == Clear Matching ==
    /// Removes every key matched by `matcher`, returning the number removed.
    pub fn clear_matching(&mut self, matcher: &GlobMatcher) -> usize {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| matcher.is_match(key.as_str()))
            .cloned()
            .collect();

        for key in &keys {
            self.remove_entry(key);
        }
        keys.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        self.stats.record_expirations(expired.len());
        expired.len()
    }

    pub fn stats(&self) -> LocalStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(slot) => {
                self.written.remove(&slot.seq);
                self.stats.set_total_entries(self.entries.len());
                true
            }
            None => false,
        }
    }
}
