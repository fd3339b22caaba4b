//! In-process fallback store.
//!
//! A bounded LRU map with per-entry expiry. Expired entries are never
//! returned; they are purged lazily on access and in bulk by
//! [`MemoryStore::purge_expired`]. Contents are lost on restart.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use bomhub_core::cache::{pattern_matches, CachedValue};

#[derive(Debug, Clone)]
struct Entry {
    value: CachedValue,
    /// `None` when the TTL is too large to represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: CachedValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Thread-safe in-process cache with TTL and LRU eviction.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryStore {
    /// Creates a store holding at most `max_entries` entries. A capacity of 0
    /// is treated as 1.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn insert(&self, key: &str, value: CachedValue, ttl: Duration) {
        self.entries
            .lock()
            .put(key.to_string(), Entry::new(value, ttl));
    }

    /// Returns the live value for `key`, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(Instant::now()) => return Some(entry.value.clone()),
            Some(_) => {}
        }

        entries.pop(key);
        None
    }

    /// Removes `key`, returning whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .lock()
            .pop(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes every entry whose key matches `pattern`, returning how many
    /// live entries were removed.
    pub fn remove_matching(&self, pattern: &str) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let matching: Vec<String> = entries
            .iter()
            .filter(|(key, _)| pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();

        matching
            .iter()
            .filter_map(|key| entries.pop(key))
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Drops every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unexpired entries.
    pub fn live_len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
