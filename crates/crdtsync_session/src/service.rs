//! Service facade: the session engine wired over one store and engine.

use crate::config::SessionConfig;
use crate::documents::DocumentAccess;
use crate::error::SyncResult;
use crate::operations::{AddOutcome, EntityOperations};
use crate::protocol::{CommitReport, PullReport, SyncProtocol};
use crate::registry::{Session, SessionRegistry};
use crdtsync_core::{
    DocumentEngine, EntityDescriptor, EntityRegistry, Fields, Mutation, NewRecord, Record,
    RecordId, AutomergeEngine,
};
use crdtsync_storage::{DocumentStore, InMemoryStore, ScopeId};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Read-only view of one stored document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDump {
    /// Entity type of the document.
    pub entity_type: String,
    /// Engine version of the document, absent if it failed to load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Live records, empty if the document failed to load.
    pub records: Vec<Record>,
    /// Load error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only view of a session and its replica.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDump {
    /// Client the session belongs to.
    pub client_id: String,
    /// Session id.
    pub session_id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// Last commit or pull, milliseconds since the Unix epoch.
    pub last_sync_ms: u64,
    /// One entry per stored document.
    pub entities: Vec<DocumentDump>,
}

/// The session engine over one store and document engine.
///
/// Owns the shared [`SessionRegistry`] and hands out the entity operations
/// and sync protocol built on it. Construct one per store; there is no
/// global instance.
///
/// # Example
///
/// ```
/// use crdtsync_session::SyncService;
///
/// let service = SyncService::in_memory().unwrap();
/// let todos = service.read("alice", "todos").unwrap();
/// assert_eq!(todos.len(), 1);
/// ```
pub struct SyncService<S, E> {
    config: SessionConfig,
    entities: Arc<EntityRegistry>,
    documents: Arc<DocumentAccess<S, E>>,
    sessions: Arc<SessionRegistry<S>>,
    operations: EntityOperations<S, E>,
    protocol: SyncProtocol<S, E>,
}

impl SyncService<InMemoryStore, AutomergeEngine> {
    /// Creates a service over a fresh in-memory store with the built-in
    /// entity types and default configuration.
    pub fn in_memory() -> SyncResult<Self> {
        Self::new(
            InMemoryStore::new(),
            AutomergeEngine::new(),
            EntityRegistry::with_builtin(),
            SessionConfig::default(),
        )
    }
}

impl<S: DocumentStore, E: DocumentEngine> SyncService<S, E> {
    /// Creates a service, seeding main if the configuration asks for it.
    ///
    /// # Errors
    ///
    /// Fails if seeding cannot read or write main.
    pub fn new(
        store: S,
        engine: E,
        entities: EntityRegistry,
        config: SessionConfig,
    ) -> SyncResult<Self> {
        let store = Arc::new(store);
        let entities = Arc::new(entities);
        let documents = Arc::new(DocumentAccess::new(Arc::clone(&store), Arc::new(engine)));
        let sessions = Arc::new(SessionRegistry::new(store));

        let service = Self {
            operations: EntityOperations::new(
                Arc::clone(&sessions),
                Arc::clone(&documents),
                Arc::clone(&entities),
            ),
            protocol: SyncProtocol::new(Arc::clone(&sessions), Arc::clone(&documents)),
            config,
            entities,
            documents,
            sessions,
        };

        if service.config.seed_on_start {
            service.seed_main()?;
        }
        Ok(service)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the registered entity types.
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Returns the session registry.
    pub fn sessions(&self) -> &SessionRegistry<S> {
        &self.sessions
    }

    /// Returns the entity operations.
    pub fn operations(&self) -> &EntityOperations<S, E> {
        &self.operations
    }

    /// Returns the sync protocol.
    pub fn protocol(&self) -> &SyncProtocol<S, E> {
        &self.protocol
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        self.documents.store()
    }

    /// See [`SessionRegistry::create_session`].
    pub fn create_session(&self, client_id: &str) -> SyncResult<Session> {
        self.sessions.create_session(client_id)
    }

    /// See [`SessionRegistry::close_session`].
    pub fn close_session(&self, client_id: &str) -> SyncResult<bool> {
        self.sessions.close_session(client_id)
    }

    /// See [`EntityOperations::read`].
    pub fn read(&self, client_id: &str, entity_type: &str) -> SyncResult<Vec<Record>> {
        self.operations.read(client_id, entity_type)
    }

    /// See [`EntityOperations::add`].
    pub fn add(&self, client_id: &str, entity_type: &str, record: NewRecord) -> SyncResult<AddOutcome> {
        self.operations.add(client_id, entity_type, record)
    }

    /// See [`EntityOperations::update`].
    pub fn update(
        &self,
        client_id: &str,
        entity_type: &str,
        id: &RecordId,
        fields: &Fields,
    ) -> SyncResult<Vec<Record>> {
        self.operations.update(client_id, entity_type, id, fields)
    }

    /// See [`EntityOperations::delete`].
    pub fn delete(&self, client_id: &str, entity_type: &str, id: &RecordId) -> SyncResult<Vec<Record>> {
        self.operations.delete(client_id, entity_type, id)
    }

    /// See [`SyncProtocol::commit`].
    pub fn commit(&self, client_id: &str, entity_types: Option<&[String]>) -> SyncResult<CommitReport> {
        self.protocol.commit(client_id, entity_types)
    }

    /// See [`SyncProtocol::pull`].
    pub fn pull(&self, client_id: &str, entity_types: Option<&[String]>) -> SyncResult<PullReport> {
        self.protocol.pull(client_id, entity_types)
    }

    /// Writes the seed document of every registered entity type main does
    /// not hold yet. Returns the entity types written.
    ///
    /// # Errors
    ///
    /// Fails if main cannot be read or written.
    pub fn seed_main(&self) -> SyncResult<Vec<String>> {
        let main = ScopeId::main();
        let mut seeded = Vec::new();

        for descriptor in self.entities.iter() {
            let entity_type = descriptor.name();
            let written = self.protocol.with_main_lock(entity_type, || -> SyncResult<bool> {
                if self.documents.store().get(&main, entity_type)?.is_some() {
                    return Ok(false);
                }
                let document = self.seed_document(descriptor)?;
                self.documents.save(&main, entity_type, &document)?;
                Ok(true)
            })?;
            if written {
                seeded.push(entity_type.to_string());
            }
        }

        if !seeded.is_empty() {
            info!(entities = ?seeded, "seeded main");
        }
        Ok(seeded)
    }

    fn seed_document(&self, descriptor: &EntityDescriptor) -> SyncResult<E::Document> {
        let engine = self.documents.engine();
        let mut document = engine.init(descriptor.name())?;
        for record in descriptor.seed_records() {
            document = engine.mutate(
                &document,
                self.config.main_actor,
                &Mutation::Insert(record.clone()),
            )?;
        }
        Ok(document)
    }

    /// Closes every session, drops every scope in the store and reseeds
    /// main from the registered descriptors. If `client_id` is given, a fresh session is opened for
    /// it afterwards and returned.
    ///
    /// Runs exclusively: no other session operation overlaps a reset.
    ///
    /// # Errors
    ///
    /// Fails if a scope cannot be dropped or main cannot be reseeded.
    pub fn reset(&self, client_id: Option<&str>) -> SyncResult<Option<Session>> {
        let closed = self.sessions.reset_with(|| {
            // scopes of sessions from an earlier process are not registered
            for scope in self.documents.store().list_scopes()? {
                if !scope.is_main() {
                    self.documents.drop_scope(&scope)?;
                }
            }
            self.documents.drop_scope(&ScopeId::main())?;
            self.seed_main()?;
            Ok(())
        })?;
        warn!(closed, "store reset");

        client_id
            .map(|client_id| self.sessions.create_session(client_id))
            .transpose()
    }

    /// Dumps every document in a scope. Never writes.
    ///
    /// # Errors
    ///
    /// Fails only if storage is unavailable; undecodable documents are
    /// reported in their own entry.
    pub fn dump_scope(&self, scope: &ScopeId) -> SyncResult<Vec<DocumentDump>> {
        let engine = self.documents.engine();
        let mut dumps = Vec::new();
        for entity_type in self.documents.entity_types(scope)? {
            let dump = match self.documents.load(scope, &entity_type) {
                Ok(Some(document)) => DocumentDump {
                    entity_type,
                    version: Some(engine.version(&document)),
                    records: engine.records(&document),
                    error: None,
                },
                Ok(None) => continue,
                Err(e) if e.aborts_batch() => return Err(e),
                Err(e) => DocumentDump {
                    entity_type,
                    version: None,
                    records: Vec::new(),
                    error: Some(e.to_string()),
                },
            };
            dumps.push(dump);
        }
        Ok(dumps)
    }

    /// Dumps every document in main.
    ///
    /// # Errors
    ///
    /// Same as [`SyncService::dump_scope`].
    pub fn dump_main(&self) -> SyncResult<Vec<DocumentDump>> {
        self.dump_scope(&ScopeId::main())
    }

    /// Dumps a client's session, `None` if the client has none. Never
    /// creates a session.
    ///
    /// # Errors
    ///
    /// Same as [`SyncService::dump_scope`].
    pub fn dump_session(&self, client_id: &str) -> SyncResult<Option<SessionDump>> {
        let Some(session) = self.sessions.session(client_id) else {
            return Ok(None);
        };
        let entities = self.dump_scope(&session.scope)?;
        Ok(Some(SessionDump {
            client_id: session.client_id,
            session_id: session.session_id.to_string(),
            created_at_ms: unix_millis(session.created_at),
            last_sync_ms: unix_millis(session.last_sync_time),
            entities,
        }))
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
