//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use crate::messages::{ApiRequest, ApiResponse, ErrorBody};
use crdtsync_core::{AutomergeEngine, DocumentEngine};
use crdtsync_session::{SyncResult, SyncService};
use crdtsync_storage::{DocumentStore, InMemoryStore};
use std::sync::Arc;
use tracing::{debug, error};

/// The sync server.
///
/// Turns [`ApiRequest`]s into [`ApiResponse`]s against one
/// [`SyncService`]. Failures come back as [`ApiResponse::Error`] with the
/// status code the transport should send.
///
/// # Example
///
/// ```
/// use crdtsync_server::{ApiRequest, ServerConfig, SyncServer};
///
/// let server = SyncServer::in_memory(ServerConfig::default()).unwrap();
///
/// // In a real application, an HTTP layer would decode requests and
/// // send back `response.status()` with the JSON body.
/// let response = server.handle_message(ApiRequest::CreateSession {
///     client_id: Some("alice".into()),
/// });
/// assert!(response.is_success());
/// ```
pub struct SyncServer<S, E> {
    handler: RequestHandler<S, E>,
    service: Arc<SyncService<S, E>>,
}

impl SyncServer<InMemoryStore, AutomergeEngine> {
    /// Creates a server over a fresh in-memory store, seeded with the
    /// built-in entity types.
    pub fn in_memory(config: ServerConfig) -> SyncResult<Self> {
        Ok(Self::new(config, SyncService::in_memory()?))
    }
}

impl<S: DocumentStore, E: DocumentEngine> SyncServer<S, E> {
    /// Creates a new sync server.
    pub fn new(config: ServerConfig, service: SyncService<S, E>) -> Self {
        let service = Arc::new(service);
        let handler = RequestHandler::new(config, Arc::clone(&service));
        Self { handler, service }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        self.handler.config()
    }

    /// Returns the session engine.
    pub fn service(&self) -> &SyncService<S, E> {
        &self.service
    }

    /// Handles a request, propagating failures.
    pub fn handle(&self, request: ApiRequest) -> ServerResult<ApiResponse> {
        self.handler.handle(request)
    }

    /// Handles a request, turning failures into an error response.
    pub fn handle_message(&self, request: ApiRequest) -> ApiResponse {
        let name = request.name();
        match self.handler.handle(request) {
            Ok(response) => response,
            Err(e) => {
                if e.is_server_error() {
                    error!(request = name, error = %e, "request failed");
                } else {
                    debug!(request = name, error = %e, "request rejected");
                }
                ApiResponse::Error(ErrorBody {
                    status: e.status_code(),
                    error: e.to_string(),
                })
            }
        }
    }

    /// Handles a JSON-encoded request and returns the status code and JSON
    /// body to send back.
    pub fn handle_json(&self, body: &str) -> (u16, String) {
        let response = match serde_json::from_str::<ApiRequest>(body) {
            Ok(request) => self.handle_message(request),
            Err(e) => {
                let err = ServerError::InvalidRequest(e.to_string());
                ApiResponse::Error(ErrorBody {
                    status: err.status_code(),
                    error: err.to_string(),
                })
            }
        };

        match serde_json::to_string(&response) {
            Ok(json) => (response.status(), json),
            Err(e) => {
                error!(error = %e, "failed to encode response");
                let err = ServerError::Internal(e.to_string());
                let body = serde_json::json!({
                    "status": err.status_code(),
                    "error": err.to_string(),
                });
                (err.status_code(), body.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn server() -> SyncServer<InMemoryStore, AutomergeEngine> {
        SyncServer::in_memory(ServerConfig::default()).unwrap()
    }

    fn call(server: &SyncServer<InMemoryStore, AutomergeEngine>, request: Value) -> (u16, Value) {
        let (status, body) = server.handle_json(&request.to_string());
        (status, serde_json::from_str(&body).unwrap())
    }

    #[test]
    fn server_lifecycle() {
        let server = server();
        assert_eq!(server.config().default_client_id, "default-user");
        assert_eq!(server.service().sessions().session_count(), 0);
    }

    #[test]
    fn full_sync_flow() {
        let server = server();

        // 1. Two sessions start from the seeded main
        let (status, body) = call(&server, json!({"type": "createSession", "clientId": "a"}));
        assert_eq!(status, 200);
        assert!(body["sessionId"].is_string());
        call(&server, json!({"type": "createSession", "clientId": "b"}));

        // 2. A adds a record
        let (status, body) = call(
            &server,
            json!({
                "type": "createRecord",
                "clientId": "a",
                "entityType": "todos",
                "record": {"id": "2", "title": "Buy eggs", "description": "A dozen"},
            }),
        );
        assert_eq!(status, 200);
        assert_eq!(body["recordId"], "2");
        assert_eq!(body["records"].as_array().unwrap().len(), 2);

        // 3. A commits
        let (status, body) = call(&server, json!({"type": "commit", "clientId": "a"}));
        assert_eq!(status, 200);
        assert_eq!(body["results"], json!([{"entityType": "todos", "status": "merged"}]));

        // 4. B pulls and sees both records
        let (_, body) = call(&server, json!({"type": "pull", "clientId": "b"}));
        assert_eq!(body["ok"], true);
        let (_, body) = call(
            &server,
            json!({"type": "listRecords", "clientId": "b", "entityType": "todos"}),
        );
        assert_eq!(body["records"][1]["title"], "Buy eggs");
    }

    #[test]
    fn malformed_request() {
        let server = server();
        let (status, body) = server.handle_json("{not json");
        assert_eq!(status, 400);
        assert!(body.contains("invalid request"));
    }

    #[test]
    fn validation_error_response() {
        let server = server();
        let (status, body) = call(
            &server,
            json!({
                "type": "createRecord",
                "entityType": "todos",
                "record": {"title": "No description"},
            }),
        );
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("description"));
    }

    #[test]
    fn commit_without_session_is_not_found() {
        let server = server();
        let response = server.handle_message(ApiRequest::Commit {
            client_id: None,
            entity_types: None,
        });
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn reset_opens_session_for_caller() {
        let server = server();
        call(&server, json!({"type": "createSession", "clientId": "other"}));

        let (status, body) = call(&server, json!({"type": "reset", "clientId": "admin"}));
        assert_eq!(status, 200);
        assert_eq!(body["clientId"], "admin");
        assert_eq!(server.service().sessions().session_count(), 1);
    }

    #[test]
    fn debug_dumps() {
        let server = server();
        let (_, body) = call(&server, json!({"type": "debugMain"}));
        assert_eq!(body[0]["entityType"], "todos");
        assert_eq!(body[0]["records"][0]["title"], "Buy milk");

        let (status, _) = call(&server, json!({"type": "debugSession", "clientId": "x"}));
        assert_eq!(status, 404);
        // the lookup must not create a session
        assert_eq!(server.service().sessions().session_count(), 0);
    }
}
