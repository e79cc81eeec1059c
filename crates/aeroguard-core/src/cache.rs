//! Per-location reading cache.
//!
//! A cached reading is served instead of calling the source while it is
//! younger than the cache TTL. Age is measured from when the fetch was
//! issued.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use aeroguard_types::Reading;

#[derive(Debug, Clone)]
struct CacheEntry {
    reading: Reading,
    fetched_at: Instant,
}

/// Reading cache keyed by location name.
#[derive(Debug, Clone)]
pub struct ReadingCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl ReadingCache {
    /// Create an empty cache whose entries stay fresh for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// How long entries stay fresh.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached reading for `location`, if still fresh at `now`.
    pub fn get(&self, location: &str, now: Instant) -> Option<&Reading> {
        self.entries
            .get(location)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| &entry.reading)
    }

    /// Store a reading fetched at `fetched_at`, replacing any previous entry.
    pub fn insert(&mut self, reading: Reading, fetched_at: Instant) {
        self.entries.insert(
            reading.location.clone(),
            CacheEntry {
                reading,
                fetched_at,
            },
        );
    }

    /// Drop entries that are no longer fresh at `now`.
    pub fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < ttl);
    }

    /// Number of entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
