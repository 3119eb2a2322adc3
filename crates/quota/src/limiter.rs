//! The quota limiter.

use std::time::Duration;

use config::QuotaConfig;

use crate::{
    error::QuotaError,
    storage::{CounterStore, IncrementOutcome, Storage, StorageError},
};

/// How many times a check goes around the create/increment cycle before giving up.
const MAX_ATTEMPTS: usize = 3;

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request fits the quota. `count` includes it.
    Allowed {
        /// Requests counted in the current window.
        count: u64,
    },
    /// The quota is exhausted until the counter expires.
    Denied {
        /// Requests counted in the current window.
        count: u64,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Requests counted in the current window.
    pub fn count(&self) -> u64 {
        match self {
            Decision::Allowed { count } | Decision::Denied { count } => *count,
        }
    }
}

/// Counts requests per client key and cuts clients off at a fixed limit.
///
/// A client's window starts with its first request and lasts `window`; it is
/// never extended by later requests, allowed or denied.
pub struct QuotaLimiter<S = Storage> {
    store: S,
    limit: u64,
    window: Duration,
}

impl QuotaLimiter<Storage> {
    /// Builds the limiter and its configured counter store.
    pub async fn from_config(config: &QuotaConfig) -> Result<Self, QuotaError> {
        let store = Storage::from_config(&config.storage).await?;

        Ok(Self::new(store, config.limit, config.window))
    }
}

impl<S: CounterStore> QuotaLimiter<S> {
    /// Create a new limiter over `store`.
    pub fn new(store: S, limit: u64, window: Duration) -> Self {
        Self { store, limit, window }
    }

    /// Maximum requests per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Lifetime of a counter.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The underlying counter store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Counts one request for `key` and decides whether it may proceed.
    pub async fn check(&self, key: &str) -> Result<Decision, QuotaError> {
        if self.limit == 0 {
            return Ok(Decision::Denied { count: 0 });
        }

        for attempt in 1..=MAX_ATTEMPTS {
            match self.store.increment_below(key, self.limit).await? {
                IncrementOutcome::Incremented(count) => {
                    log::debug!("Quota for '{key}': {count}/{} used", self.limit);
                    return Ok(Decision::Allowed { count });
                }
                IncrementOutcome::AtCeiling(count) => {
                    log::debug!("Quota for '{key}' exhausted at {count}/{}", self.limit);
                    return Ok(Decision::Denied { count });
                }
                IncrementOutcome::Missing => {
                    if self.store.add(key, 1, self.window).await? {
                        log::debug!("Quota window opened for '{key}'");
                        return Ok(Decision::Allowed { count: 1 });
                    }

                    log::debug!("Quota counter for '{key}' was created concurrently, retrying (attempt {attempt})");
                }
            }
        }

        Err(StorageError::Contention {
            key: key.to_string(),
            attempts: MAX_ATTEMPTS,
        }
        .into())
    }

    /// Requests counted for `key` in its current window, if it has one.
    pub async fn count(&self, key: &str) -> Result<Option<u64>, QuotaError> {
        Ok(self.store.get(key).await?)
    }
}
