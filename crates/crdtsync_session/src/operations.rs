//! Entity operations against a session replica.

use crate::documents::DocumentAccess;
use crate::error::{SyncError, SyncResult};
use crate::registry::{Access, Session, SessionRegistry};
use crdtsync_core::{
    diff_fields, DocumentEngine, EntityRegistry, Fields, Mutation, NewRecord, Record, RecordId,
};
use crdtsync_storage::{DocumentStore, ScopeId};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Result of adding a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    /// Id of the new record.
    pub id: RecordId,
    /// Full record list after the insert.
    pub records: Vec<Record>,
}

/// List, add, update and delete records in a client's session replica.
///
/// Every operation creates the session if the client has none. Each
/// read-modify-write runs under the client's session lock.
pub struct EntityOperations<S, E> {
    sessions: Arc<SessionRegistry<S>>,
    documents: Arc<DocumentAccess<S, E>>,
    entities: Arc<EntityRegistry>,
}

impl<S: DocumentStore, E: DocumentEngine> EntityOperations<S, E> {
    /// Creates entity operations over shared components.
    pub fn new(
        sessions: Arc<SessionRegistry<S>>,
        documents: Arc<DocumentAccess<S, E>>,
        entities: Arc<EntityRegistry>,
    ) -> Self {
        Self {
            sessions,
            documents,
            entities,
        }
    }

    /// Loads the session's document, initializing it from main (or empty)
    /// and persisting it if the session has none yet.
    fn load_or_init(&self, session: &Session, entity_type: &str) -> SyncResult<E::Document> {
        if let Some(document) = self.documents.load(&session.scope, entity_type)? {
            return Ok(document);
        }

        let document = match self.documents.load(&ScopeId::main(), entity_type)? {
            Some(main) => main,
            None => self.documents.engine().init(entity_type)?,
        };
        self.documents.save(&session.scope, entity_type, &document)?;
        debug!(client_id = %session.client_id, entity_type, "initialized session document");
        Ok(document)
    }

    fn apply(
        &self,
        session: &Session,
        entity_type: &str,
        document: &E::Document,
        mutation: &Mutation,
    ) -> SyncResult<E::Document> {
        let engine = self.documents.engine();
        let next = engine.mutate(document, session.actor(), mutation)?;
        self.documents.save(&session.scope, entity_type, &next)?;
        Ok(next)
    }

    /// Returns the client's records of an entity type.
    pub fn read(&self, client_id: &str, entity_type: &str) -> SyncResult<Vec<Record>> {
        self.sessions
            .with_session(client_id, Access::CreateIfMissing, |session| {
                let document = self.load_or_init(session, entity_type)?;
                Ok(self.documents.engine().records(&document))
            })
    }

    /// Adds a record, generating its id if none was given.
    ///
    /// Required fields of the entity type are checked and its defaults
    /// filled in before anything is written.
    pub fn add(&self, client_id: &str, entity_type: &str, input: NewRecord) -> SyncResult<AddOutcome> {
        let descriptor = self
            .entities
            .get(entity_type)
            .ok_or_else(|| SyncError::UnknownEntityType(entity_type.to_string()))?;
        descriptor.validate_new(&input.fields)?;

        let id = input.id.unwrap_or_else(RecordId::generate);
        let record = Record::new(id.clone(), descriptor.with_defaults(input.fields));

        self.sessions
            .with_session(client_id, Access::CreateIfMissing, |session| {
                let document = self.load_or_init(session, entity_type)?;
                let next = self.apply(session, entity_type, &document, &Mutation::Insert(record))?;
                debug!(client_id, entity_type, %id, "record added");
                Ok(AddOutcome {
                    id,
                    records: self.documents.engine().records(&next),
                })
            })
    }

    /// Writes the fields of `update` that differ from the stored record.
    ///
    /// Unchanged fields are not written again, so they cannot override a
    /// concurrent edit from another session at merge time. An unknown id or
    /// an empty delta leaves the document untouched.
    pub fn update(
        &self,
        client_id: &str,
        entity_type: &str,
        id: &RecordId,
        update: &Fields,
    ) -> SyncResult<Vec<Record>> {
        self.sessions
            .with_session(client_id, Access::CreateIfMissing, |session| {
                let engine = self.documents.engine();
                let document = self.load_or_init(session, entity_type)?;

                let Some(current) = engine.record(&document, id) else {
                    debug!(client_id, entity_type, %id, "update of unknown record ignored");
                    return Ok(engine.records(&document));
                };

                let changed = diff_fields(&current.fields, update);
                if changed.is_empty() {
                    debug!(client_id, entity_type, %id, "update without changes ignored");
                    return Ok(engine.records(&document));
                }

                let fields: Vec<&String> = changed.keys().collect();
                debug!(client_id, entity_type, %id, ?fields, "record updated");
                let mutation = Mutation::Update {
                    id: id.clone(),
                    fields: changed,
                };
                let next = self.apply(session, entity_type, &document, &mutation)?;
                Ok(engine.records(&next))
            })
    }

    /// Removes a record. An unknown id leaves the document untouched.
    pub fn delete(&self, client_id: &str, entity_type: &str, id: &RecordId) -> SyncResult<Vec<Record>> {
        self.sessions
            .with_session(client_id, Access::CreateIfMissing, |session| {
                let engine = self.documents.engine();
                let document = self.load_or_init(session, entity_type)?;

                if engine.record(&document, id).is_none() {
                    debug!(client_id, entity_type, %id, "delete of unknown record ignored");
                    return Ok(engine.records(&document));
                }

                let mutation = Mutation::Remove { id: id.clone() };
                let next = self.apply(session, entity_type, &document, &mutation)?;
                debug!(client_id, entity_type, %id, "record deleted");
                Ok(engine.records(&next))
            })
    }
}
