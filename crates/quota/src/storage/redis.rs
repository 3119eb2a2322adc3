//! Redis counter storage, shared by every instance pointing at the same server.

use std::{future::Future, time::Duration};

use config::RedisConfig;
use deadpool::managed::Object;
use redis::{RedisError, Script};

use super::{
    CounterStore, IncrementOutcome, StorageError,
    redis_pool::{Manager, Pool, create_pool},
};

/// Reply status codes of [`INCREMENT_BELOW`].
const MISSING: u8 = 0;
const AT_CEILING: u8 = 1;
const INCREMENTED: u8 = 2;

/// Increments KEYS[1] only if it exists and is below ARGV[1]. INCR keeps the TTL.
const INCREMENT_BELOW: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return {0, 0}
end
current = tonumber(current)
if current >= tonumber(ARGV[1]) then
  return {1, current}
end
return {2, redis.call('INCR', KEYS[1])}
"#;

/// Redis-based counter storage implementation.
pub struct RedisStorage {
    pool: Pool,
    key_prefix: String,
    response_timeout: Duration,
    increment_below: Script,
}

impl RedisStorage {
    /// Creates the connection pool and pings the server once.
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let pool = create_pool(config)
            .map_err(|e| StorageError::Connection(format!("Failed to create Redis connection pool: {e}")))?;

        let storage = Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            response_timeout: config.response_timeout,
            increment_below: Script::new(INCREMENT_BELOW),
        };

        storage
            .timed(async {
                let mut conn = storage.connection().await?;

                redis::cmd("PING")
                    .query_async::<String>(&mut *conn)
                    .await
                    .map_err(|e| StorageError::Connection(format!("Failed to ping Redis server: {e}")))
            })
            .await?;

        log::debug!("Connected to Redis for quota counters with key prefix '{}'", storage.key_prefix);

        Ok(storage)
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    async fn connection(&self) -> Result<Object<Manager>, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to get Redis connection from pool: {e}")))
    }

    /// Bounds the whole operation, including the wait for a pooled connection.
    async fn timed<T>(&self, operation: impl Future<Output = Result<T, StorageError>>) -> Result<T, StorageError> {
        tokio::time::timeout(self.response_timeout, operation)
            .await
            .map_err(|_| StorageError::Timeout(self.response_timeout))?
    }
}

fn query_error(e: RedisError) -> StorageError {
    StorageError::Query(e.to_string())
}

impl CounterStore for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let key = self.key(key);

        self.timed(async {
            let mut conn = self.connection().await?;

            redis::cmd("GET")
                .arg(&key)
                .query_async::<Option<u64>>(&mut *conn)
                .await
                .map_err(query_error)
        })
        .await
    }

    async fn add(&self, key: &str, value: u64, ttl: Duration) -> Result<bool, StorageError> {
        let key = self.key(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        self.timed(async {
            let mut conn = self.connection().await?;

            let reply = redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query_async::<Option<String>>(&mut *conn)
                .await
                .map_err(query_error)?;

            Ok(reply.is_some())
        })
        .await
    }

    async fn increment_below(&self, key: &str, ceiling: u64) -> Result<IncrementOutcome, StorageError> {
        let key = self.key(key);

        let (status, value) = self
            .timed(async {
                let mut conn = self.connection().await?;

                self.increment_below
                    .key(&key)
                    .arg(ceiling)
                    .invoke_async::<(u8, u64)>(&mut *conn)
                    .await
                    .map_err(query_error)
            })
            .await?;

        match status {
            MISSING => Ok(IncrementOutcome::Missing),
            AT_CEILING => Ok(IncrementOutcome::AtCeiling(value)),
            INCREMENTED => Ok(IncrementOutcome::Incremented(value)),
            other => Err(StorageError::Internal(format!(
                "Unexpected increment status {other} for '{key}'"
            ))),
        }
    }
}
