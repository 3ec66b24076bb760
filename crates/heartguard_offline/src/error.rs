//! Error types for the offline subsystem.

use heartguard_storage::StorageError;
use thiserror::Error;

/// Result type for offline operations.
pub type OfflineResult<T> = Result<T, OfflineError>;

/// Errors that can occur in the offline subsystem.
#[derive(Error, Debug)]
pub enum OfflineError {
    /// The persistent store is inaccessible (quota exceeded, disabled, I/O).
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// The remote API cannot be reached at all.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// A request reached the network but did not complete.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// The server answered with a non-2xx status.
    #[error("server rejected request with HTTP {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },

    /// A persisted record could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Unknown HTTP method for a queued mutation.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
}

impl OfflineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the remote API is unreachable, which ends a sync pass.
    pub fn is_network_unavailable(&self) -> bool {
        matches!(self, OfflineError::NetworkUnavailable(_))
    }

    /// Returns true if a later sync pass may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OfflineError::NetworkUnavailable(_) => true,
            OfflineError::Transport { retryable, .. } => *retryable,
            OfflineError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for OfflineError {
    fn from(err: serde_json::Error) -> Self {
        OfflineError::Codec(err.to_string())
    }
}
