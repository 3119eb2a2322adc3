//! Counter storage backends.

use std::time::Duration;

use config::StorageConfig;

pub mod memory;
pub mod redis;
mod redis_pool;

pub use memory::InMemoryStorage;
pub use redis::RedisStorage;

/// Result of [`CounterStore::increment_below`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// The counter was below the ceiling and now holds this value.
    Incremented(u64),
    /// The counter already holds this value, which is at or above the ceiling. Nothing was written.
    AtCeiling(u64),
    /// There is no live counter for the key.
    Missing,
}

/// Atomic counter primitives the quota is built on.
///
/// Every operation is linearizable per key. Expired counters behave exactly
/// like missing ones.
#[allow(async_fn_in_trait)]
pub trait CounterStore: Send + Sync {
    /// Current value of the counter, if it exists and has not expired.
    async fn get(&self, key: &str) -> Result<Option<u64>, StorageError>;

    /// Creates the counter with `value`, expiring after `ttl`, unless a live
    /// counter already exists. Returns whether this call created it.
    async fn add(&self, key: &str, value: u64, ttl: Duration) -> Result<bool, StorageError>;

    /// Increments the counter only if it exists and is below `ceiling`.
    /// The expiry is left untouched.
    async fn increment_below(&self, key: &str, ceiling: u64) -> Result<IncrementOutcome, StorageError>;
}

/// Errors that can occur in storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Could not connect to, or get a connection for, the backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed a command.
    #[error("Query error: {0}")]
    Query(String),

    /// The backend did not answer in time.
    #[error("Backend did not respond within {0:?}")]
    Timeout(Duration),

    /// The counter kept disappearing between creation and increment.
    #[error("Counter '{key}' could not be updated after {attempts} attempts")]
    Contention {
        /// Counter key, without any backend prefix.
        key: String,
        /// Number of attempts made.
        attempts: usize,
    },

    /// Internal storage error.
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Counter store selected by configuration.
pub enum Storage {
    /// Process memory.
    Memory(InMemoryStorage),
    /// Shared Redis instance.
    Redis(RedisStorage),
}

impl Storage {
    /// Builds the configured store. For Redis this connects and pings the server.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let storage = match config {
            StorageConfig::Memory => Storage::Memory(InMemoryStorage::new()),
            StorageConfig::Redis(redis_config) => Storage::Redis(RedisStorage::new(redis_config).await?),
        };

        Ok(storage)
    }
}

impl CounterStore for Storage {
    async fn get(&self, key: &str) -> Result<Option<u64>, StorageError> {
        match self {
            Storage::Memory(storage) => storage.get(key).await,
            Storage::Redis(storage) => storage.get(key).await,
        }
    }

    async fn add(&self, key: &str, value: u64, ttl: Duration) -> Result<bool, StorageError> {
        match self {
            Storage::Memory(storage) => storage.add(key, value, ttl).await,
            Storage::Redis(storage) => storage.add(key, value, ttl).await,
        }
    }

    async fn increment_below(&self, key: &str, ceiling: u64) -> Result<IncrementOutcome, StorageError> {
        match self {
            Storage::Memory(storage) => storage.increment_below(key, ceiling).await,
            Storage::Redis(storage) => storage.increment_below(key, ceiling).await,
        }
    }
}
