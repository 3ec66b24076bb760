//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The write would grow the store past its quota.
    #[error("quota exceeded: {requested} bytes requested, quota is {quota} bytes")]
    QuotaExceeded {
        /// Total size the store would have after the write.
        requested: usize,
        /// Maximum size of the store.
        quota: usize,
    },

    /// The store directory is locked by another process.
    #[error("store is locked by another process: {0}")]
    Locked(String),

    /// The persisted store file could not be parsed.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// The store is closed or disabled.
    #[error("store is closed")]
    Closed,
}
