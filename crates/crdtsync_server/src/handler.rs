//! Request handlers.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::messages::{ApiRequest, ApiResponse};
use crdtsync_core::{DocumentEngine, Fields, NewRecord, RecordId};
use crdtsync_session::SyncService;
use crdtsync_storage::DocumentStore;
use std::sync::Arc;
use tracing::debug;

/// Handles requests against a [`SyncService`].
pub struct RequestHandler<S, E> {
    config: ServerConfig,
    service: Arc<SyncService<S, E>>,
}

impl<S: DocumentStore, E: DocumentEngine> RequestHandler<S, E> {
    /// Creates a new request handler.
    pub fn new(config: ServerConfig, service: Arc<SyncService<S, E>>) -> Self {
        Self { config, service }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Resolves the acting client: the given id, or the configured default
    /// when none (or an empty one) was sent.
    pub fn client_id<'a>(&'a self, given: Option<&'a str>) -> &'a str {
        match given {
            Some(id) if !id.is_empty() => id,
            _ => &self.config.default_client_id,
        }
    }

    fn check_entity_type(&self, entity_type: &str) -> ServerResult<()> {
        if self.service.entities().contains(entity_type) {
            Ok(())
        } else {
            Err(ServerError::UnknownEntityType(entity_type.to_string()))
        }
    }

    fn check_batch(&self, entity_types: Option<&[String]>) -> ServerResult<()> {
        match entity_types {
            Some(types) if types.len() > self.config.max_commit_types => {
                Err(ServerError::InvalidRequest(format!(
                    "too many entity types: {} > {}",
                    types.len(),
                    self.config.max_commit_types
                )))
            }
            _ => Ok(()),
        }
    }

    /// Dispatches a request to its handler.
    pub fn handle(&self, request: ApiRequest) -> ServerResult<ApiResponse> {
        debug!(request = request.name(), "handling request");
        match request {
            ApiRequest::CreateSession { client_id } => {
                self.handle_create_session(client_id.as_deref())
            }
            ApiRequest::CloseSession { client_id } => self.handle_close_session(client_id.as_deref()),
            ApiRequest::Commit {
                client_id,
                entity_types,
            } => self.handle_commit(client_id.as_deref(), entity_types.as_deref()),
            ApiRequest::Pull {
                client_id,
                entity_types,
            } => self.handle_pull(client_id.as_deref(), entity_types.as_deref()),
            ApiRequest::ListRecords {
                client_id,
                entity_type,
            } => self.handle_list(client_id.as_deref(), &entity_type),
            ApiRequest::CreateRecord {
                client_id,
                entity_type,
                record,
            } => self.handle_create(client_id.as_deref(), &entity_type, record),
            ApiRequest::UpdateRecord {
                client_id,
                entity_type,
                id,
                fields,
            } => self.handle_update(client_id.as_deref(), &entity_type, &id, &fields),
            ApiRequest::DeleteRecord {
                client_id,
                entity_type,
                id,
            } => self.handle_delete(client_id.as_deref(), &entity_type, &id),
            ApiRequest::Reset { client_id } => self.handle_reset(client_id.as_deref()),
            ApiRequest::DebugMain => self.handle_debug_main(),
            ApiRequest::DebugSession { client_id } => self.handle_debug_session(&client_id),
        }
    }

    /// Handles a create-session request.
    pub fn handle_create_session(&self, client_id: Option<&str>) -> ServerResult<ApiResponse> {
        let session = self.service.create_session(self.client_id(client_id))?;
        Ok(ApiResponse::Session {
            session_id: session.session_id.to_string(),
            client_id: session.client_id,
        })
    }

    /// Handles a close-session request.
    pub fn handle_close_session(&self, client_id: Option<&str>) -> ServerResult<ApiResponse> {
        let closed = self.service.close_session(self.client_id(client_id))?;
        Ok(ApiResponse::Closed { closed })
    }

    /// Handles a commit request.
    pub fn handle_commit(
        &self,
        client_id: Option<&str>,
        entity_types: Option<&[String]>,
    ) -> ServerResult<ApiResponse> {
        self.check_batch(entity_types)?;
        let report = self.service.commit(self.client_id(client_id), entity_types)?;
        Ok(ApiResponse::Committed {
            results: report.results,
        })
    }

    /// Handles a pull request.
    pub fn handle_pull(
        &self,
        client_id: Option<&str>,
        entity_types: Option<&[String]>,
    ) -> ServerResult<ApiResponse> {
        self.check_batch(entity_types)?;
        let report = self.service.pull(self.client_id(client_id), entity_types)?;
        Ok(ApiResponse::Pulled {
            ok: report.is_complete(),
            results: report.results,
        })
    }

    /// Handles a list request.
    pub fn handle_list(&self, client_id: Option<&str>, entity_type: &str) -> ServerResult<ApiResponse> {
        self.check_entity_type(entity_type)?;
        let records = self.service.read(self.client_id(client_id), entity_type)?;
        Ok(ApiResponse::Records { records })
    }

    /// Handles a create request.
    pub fn handle_create(
        &self,
        client_id: Option<&str>,
        entity_type: &str,
        record: NewRecord,
    ) -> ServerResult<ApiResponse> {
        self.check_entity_type(entity_type)?;
        let outcome = self
            .service
            .add(self.client_id(client_id), entity_type, record)?;
        Ok(ApiResponse::Created {
            record_id: outcome.id,
            records: outcome.records,
        })
    }

    /// Handles an update request.
    pub fn handle_update(
        &self,
        client_id: Option<&str>,
        entity_type: &str,
        id: &RecordId,
        fields: &Fields,
    ) -> ServerResult<ApiResponse> {
        self.check_entity_type(entity_type)?;
        let records = self
            .service
            .update(self.client_id(client_id), entity_type, id, fields)?;
        Ok(ApiResponse::Records { records })
    }

    /// Handles a delete request.
    pub fn handle_delete(
        &self,
        client_id: Option<&str>,
        entity_type: &str,
        id: &RecordId,
    ) -> ServerResult<ApiResponse> {
        self.check_entity_type(entity_type)?;
        let records = self
            .service
            .delete(self.client_id(client_id), entity_type, id)?;
        Ok(ApiResponse::Records { records })
    }

    /// Handles a reset request. Not safe under concurrent traffic from
    /// other clients: their sessions are dropped.
    pub fn handle_reset(&self, client_id: Option<&str>) -> ServerResult<ApiResponse> {
        let client_id = self.client_id(client_id);
        let session = self
            .service
            .reset(Some(client_id))?
            .ok_or_else(|| ServerError::Internal("reset did not open a session".into()))?;
        Ok(ApiResponse::Session {
            session_id: session.session_id.to_string(),
            client_id: session.client_id,
        })
    }

    /// Handles a main dump request.
    pub fn handle_debug_main(&self) -> ServerResult<ApiResponse> {
        Ok(ApiResponse::MainDump(self.service.dump_main()?))
    }

    /// Handles a session dump request.
    pub fn handle_debug_session(&self, client_id: &str) -> ServerResult<ApiResponse> {
        self.service
            .dump_session(client_id)?
            .map(ApiResponse::SessionDump)
            .ok_or_else(|| ServerError::SessionNotFound(client_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdtsync_core::AutomergeEngine;
    use crdtsync_storage::InMemoryStore;
    use serde_json::json;

    fn create_handler() -> RequestHandler<InMemoryStore, AutomergeEngine> {
        let service = Arc::new(SyncService::in_memory().unwrap());
        RequestHandler::new(ServerConfig::default(), service)
    }

    fn record_ids(response: &ApiResponse) -> Vec<String> {
        match response {
            ApiResponse::Records { records } | ApiResponse::Created { records, .. } => {
                records.iter().map(|r| r.id.to_string()).collect()
            }
            other => unreachable!("not a record list: {other:?}"),
        }
    }

    #[test]
    fn default_client_id() {
        let handler = create_handler();
        assert_eq!(handler.client_id(None), "default-user");
        assert_eq!(handler.client_id(Some("")), "default-user");
        assert_eq!(handler.client_id(Some("alice")), "alice");
    }

    #[test]
    fn create_session_twice() {
        let handler = create_handler();
        let first = handler.handle_create_session(Some("alice")).unwrap();
        let second = handler.handle_create_session(Some("alice")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn close_reports_whether_session_existed() {
        let handler = create_handler();
        assert_eq!(
            handler.handle_close_session(None).unwrap(),
            ApiResponse::Closed { closed: false }
        );
        handler.handle_create_session(None).unwrap();
        assert_eq!(
            handler.handle_close_session(None).unwrap(),
            ApiResponse::Closed { closed: true }
        );
    }

    #[test]
    fn crud_returns_full_list() {
        let handler = create_handler();
        let fields = json!({"title": "Buy eggs", "description": "A dozen"});
        let record = NewRecord::new(fields.as_object().unwrap().clone()).with_id("2");

        let created = handler.handle_create(Some("alice"), "todos", record).unwrap();
        assert_eq!(record_ids(&created), vec!["1", "2"]);

        let update = json!({"done": true});
        let updated = handler
            .handle_update(
                Some("alice"),
                "todos",
                &RecordId::new("2"),
                update.as_object().unwrap(),
            )
            .unwrap();
        assert_eq!(record_ids(&updated), vec!["1", "2"]);

        let deleted = handler
            .handle_delete(Some("alice"), "todos", &RecordId::new("1"))
            .unwrap();
        assert_eq!(record_ids(&deleted), vec!["2"]);
    }

    #[test]
    fn unknown_entity_type() {
        let handler = create_handler();
        let err = handler.handle_list(None, "widgets").unwrap_err();
        assert!(matches!(err, ServerError::UnknownEntityType(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn commit_batch_limit() {
        let service = Arc::new(SyncService::in_memory().unwrap());
        let handler =
            RequestHandler::new(ServerConfig::default().with_max_commit_types(1), service);
        handler.handle_create_session(None).unwrap();

        let types = vec!["todos".to_string(), "notes".to_string()];
        let err = handler.handle_commit(None, Some(&types)).unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[test]
    fn commit_without_session() {
        let handler = create_handler();
        let err = handler.handle_commit(Some("ghost"), None).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn debug_session_not_found() {
        let handler = create_handler();
        let err = handler.handle_debug_session("ghost").unwrap_err();
        assert!(matches!(err, ServerError::SessionNotFound(_)));
    }
}
