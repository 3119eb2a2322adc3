//! In-memory counter storage.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::Instant;

use super::{CounterStore, IncrementOutcome, StorageError};

/// Expired counters are swept once every this many created counters.
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug)]
struct Counter {
    value: u64,
    expires_at: Instant,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Counters kept in a sharded map, local to this process.
///
/// Each operation holds the shard lock of its key for its whole duration,
/// which makes every operation atomic per key. Expiry follows the tokio clock.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    counters: DashMap<String, Counter>,
    created: AtomicU64,
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored counters, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no counters are stored.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drops every expired counter.
    pub fn sweep(&self) {
        let now = Instant::now();
        let before = self.counters.len();

        self.counters.retain(|_, counter| !counter.is_expired(now));

        log::debug!(
            "Swept {} expired quota counters",
            before.saturating_sub(self.counters.len())
        );
    }
}

impl CounterStore for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let now = Instant::now();

        Ok(self
            .counters
            .get(key)
            .filter(|counter| !counter.is_expired(now))
            .map(|counter| counter.value))
    }

    async fn add(&self, key: &str, value: u64, ttl: Duration) -> Result<bool, StorageError> {
        let now = Instant::now();
        let fresh = Counter {
            value,
            expires_at: now + ttl,
        };

        let created = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut entry) if entry.get().is_expired(now) => {
                entry.insert(fresh);
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(fresh);
                true
            }
        };

        if created && self.created.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep();
        }

        Ok(created)
    }

    async fn increment_below(&self, key: &str, ceiling: u64) -> Result<IncrementOutcome, StorageError> {
        let now = Instant::now();

        let Some(mut counter) = self.counters.get_mut(key) else {
            return Ok(IncrementOutcome::Missing);
        };

        if counter.is_expired(now) {
            drop(counter);
            self.counters.remove_if(key, |_, counter| counter.is_expired(now));

            return Ok(IncrementOutcome::Missing);
        }

        if counter.value >= ceiling {
            return Ok(IncrementOutcome::AtCeiling(counter.value));
        }

        counter.value += 1;

        Ok(IncrementOutcome::Incremented(counter.value))
    }
}
