//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored data is unreadable at the storage layer.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The store is closed and no longer accepts requests.
    #[error("storage is closed")]
    Closed,

    /// A scope or entity type name cannot be used as a storage key.
    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl StorageError {
    /// Returns true if the store itself could not be reached.
    ///
    /// Key validation failures are caller errors, everything else means
    /// the backend is unavailable.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, StorageError::InvalidKey { .. })
    }
}
