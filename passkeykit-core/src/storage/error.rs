//! Error types for storage tiers.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`KeyValueStore`](super::KeyValueStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store refused the read.
    #[error("storage read error: {0}")]
    Read(String),

    /// The backing store refused the write (quota, privacy mode, ...).
    #[error("storage write error: {0}")]
    Write(String),

    /// The backing store is not available in this context.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Errors coming from the storage lock.
    #[error("storage lock error: {0}")]
    Lock(String),
}
