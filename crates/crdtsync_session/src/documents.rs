//! Loading and storing documents through the engine.

use crate::error::{SyncError, SyncResult};
use crdtsync_core::DocumentEngine;
use crdtsync_storage::{DocumentStore, ScopeId};
use std::sync::Arc;
use tracing::trace;

/// Typed document access over a [`DocumentStore`].
///
/// Storage failures become [`SyncError::StorageUnavailable`] and bytes the
/// engine cannot decode become [`SyncError::DocumentLoadFailure`].
pub struct DocumentAccess<S, E> {
    store: Arc<S>,
    engine: Arc<E>,
}

impl<S: DocumentStore, E: DocumentEngine> DocumentAccess<S, E> {
    /// Creates document access over a shared store and engine.
    pub fn new(store: Arc<S>, engine: Arc<E>) -> Self {
        Self { store, engine }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads and decodes a document, `None` if the scope has none.
    pub fn load(&self, scope: &ScopeId, entity_type: &str) -> SyncResult<Option<E::Document>> {
        let Some(bytes) = self.store.get(scope, entity_type)? else {
            return Ok(None);
        };
        self.engine
            .deserialize(&bytes)
            .map(Some)
            .map_err(|source| SyncError::DocumentLoadFailure {
                scope: scope.to_string(),
                entity_type: entity_type.to_string(),
                source,
            })
    }

    /// Encodes and stores a document, replacing the previous one.
    pub fn save(&self, scope: &ScopeId, entity_type: &str, document: &E::Document) -> SyncResult<()> {
        let bytes = self.engine.serialize(document)?;
        trace!(%scope, entity_type, len = bytes.len(), "storing document");
        self.store.put(scope, entity_type, bytes)?;
        Ok(())
    }

    /// Lists the entity types stored in a scope.
    pub fn entity_types(&self, scope: &ScopeId) -> SyncResult<Vec<String>> {
        Ok(self.store.list_entity_types(scope)?)
    }

    /// Removes a scope and its documents.
    pub fn drop_scope(&self, scope: &ScopeId) -> SyncResult<()> {
        Ok(self.store.drop_scope(scope)?)
    }
}
