//! Error types for the session engine.

use crdtsync_core::CoreError;
use crdtsync_storage::StorageError;
use thiserror::Error;

/// Result type for session and sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in session, entity and sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Commit requested for a client without a session.
    #[error("no active session for client {client_id:?}")]
    NoActiveSession {
        /// The client id.
        client_id: String,
    },

    /// Stored bytes could not be decoded into a document.
    #[error("failed to load {entity_type} document from scope {scope}: {source}")]
    DocumentLoadFailure {
        /// Scope the document was read from.
        scope: String,
        /// Entity type of the document.
        entity_type: String,
        /// Decoding error.
        #[source]
        source: CoreError,
    },

    /// The document store could not be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),

    /// The request was rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No descriptor is registered for the entity type.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// The document engine refused an edit or merge.
    #[error("document engine error: {0}")]
    Engine(#[source] CoreError),

    /// A batch stopped part-way; the listed entity types were already written.
    #[error("interrupted after {completed:?}: {source}")]
    Interrupted {
        /// Entity types that wrote at least one scope before the failure.
        completed: Vec<String>,
        /// The error that stopped the batch.
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::StorageUnavailable(_) => true,
            SyncError::Interrupted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if the caller sent a request that cannot succeed as is.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SyncError::NoActiveSession { .. }
                | SyncError::Validation(_)
                | SyncError::UnknownEntityType(_)
        )
    }

    /// Returns true if nothing was written before the error.
    pub fn nothing_written(&self) -> bool {
        !matches!(self, SyncError::Interrupted { .. })
    }

    /// Returns true if a multi-entity batch must stop at this error.
    ///
    /// Per-document failures only fail their own entity type.
    pub(crate) fn aborts_batch(&self) -> bool {
        matches!(
            self,
            SyncError::StorageUnavailable(_) | SyncError::Interrupted { .. }
        )
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey { .. } => SyncError::Validation(err.to_string()),
            other => SyncError::StorageUnavailable(other),
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DuplicateRecord { .. }
            | CoreError::MissingField { .. }
            | CoreError::InvalidRecord(_) => SyncError::Validation(err.to_string()),
            other => SyncError::Engine(other),
        }
    }
}
