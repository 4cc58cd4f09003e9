//! Error types for the sync server.

use crdtsync_session::SyncError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request could not be parsed or breaks a server limit.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The entity type has no registered descriptor.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// A debug lookup named a client without a session.
    #[error("session not found for client {0:?}")]
    SessionNotFound(String),

    /// The session engine failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A response could not be encoded.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::UnknownEntityType(_)
            | ServerError::SessionNotFound(_) => true,
            ServerError::Sync(e) => e.is_client_error(),
            ServerError::Internal(_) => false,
        }
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::UnknownEntityType(_) | ServerError::SessionNotFound(_) => 404,
            ServerError::Sync(e) => match e {
                SyncError::Validation(_) => 400,
                SyncError::NoActiveSession { .. } | SyncError::UnknownEntityType(_) => 404,
                _ if e.is_retryable() => 503,
                _ => 500,
            },
            ServerError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdtsync_storage::StorageError;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());

        let err = ServerError::from(SyncError::NoActiveSession {
            client_id: "alice".into(),
        });
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn storage_failures_are_unavailable() {
        let err = ServerError::from(SyncError::StorageUnavailable(StorageError::Closed));
        assert!(err.is_server_error());
        assert_eq!(err.status_code(), 503);

        let err = ServerError::from(SyncError::Validation("title required".into()));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn error_display() {
        let err = ServerError::SessionNotFound("bob".into());
        assert_eq!(err.to_string(), "session not found for client \"bob\"");

        let err = ServerError::from(SyncError::UnknownEntityType("widgets".into()));
        assert_eq!(err.to_string(), "unknown entity type: widgets");
    }
}
