//! Error types for quota checks.

use crate::storage::StorageError;

/// Errors that can occur while checking a quota.
///
/// A denied request is not an error; see [`crate::Decision`].
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// The counter store could not answer.
    #[error("Quota backend unavailable: {0}")]
    BackendUnavailable(#[from] StorageError),
}
