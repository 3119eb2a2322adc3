//! Per-client request quota for freegeoip.
//!
//! Every client key owns a counter that starts at one on the client's first
//! request and expires a fixed window after that. Requests are allowed while
//! the counter is below the limit; once it reaches the limit they are denied
//! until the counter expires.
//!
//! Counters live either in process memory or in Redis. Both stores expose the
//! same three atomic primitives, and [`QuotaLimiter`] is written against those
//! alone, so the counter can never be pushed past the limit by concurrent
//! requests.

#![deny(missing_docs)]

mod error;
mod limiter;
mod storage;

pub use error::QuotaError;
pub use limiter::{Decision, QuotaLimiter};
pub use storage::{CounterStore, InMemoryStorage, IncrementOutcome, RedisStorage, Storage, StorageError};
