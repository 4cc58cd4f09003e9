//! Document store trait definition.

use crate::error::StorageResult;
use crate::scope::ScopeId;
use bytes::Bytes;

/// A scoped key-value store for serialized documents.
///
/// Stores are **opaque blob stores**. Each scope holds at most one document
/// per entity type; the store does not know what a document contains.
///
/// # Invariants
///
/// - `put` is an upsert: it creates or replaces the document for the key
/// - `put` is atomic per key: a failed write leaves the previous value intact
/// - `get` returns exactly the bytes of the last successful `put`
/// - `drop_scope` removes every document of the scope; dropping an unknown
///   scope succeeds
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait DocumentStore: Send + Sync {
    /// Loads the document stored for `entity_type` in `scope`.
    ///
    /// Returns `Ok(None)` if the scope holds no such document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, scope: &ScopeId, entity_type: &str) -> StorageResult<Option<Bytes>>;

    /// Stores `document` for `entity_type` in `scope`, replacing any
    /// previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails. On
    /// failure the previously stored value is unchanged.
    fn put(&self, scope: &ScopeId, entity_type: &str, document: Bytes) -> StorageResult<()>;

    /// Lists the entity types that have a document in `scope`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn list_entity_types(&self, scope: &ScopeId) -> StorageResult<Vec<String>>;

    /// Removes `scope` and every document in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    fn drop_scope(&self, scope: &ScopeId) -> StorageResult<()>;

    /// Lists every scope that currently holds at least one document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn list_scopes(&self) -> StorageResult<Vec<ScopeId>>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    fn get(&self, scope: &ScopeId, entity_type: &str) -> StorageResult<Option<Bytes>> {
        (**self).get(scope, entity_type)
    }

    fn put(&self, scope: &ScopeId, entity_type: &str, document: Bytes) -> StorageResult<()> {
        (**self).put(scope, entity_type, document)
    }

    fn list_entity_types(&self, scope: &ScopeId) -> StorageResult<Vec<String>> {
        (**self).list_entity_types(scope)
    }

    fn drop_scope(&self, scope: &ScopeId) -> StorageResult<()> {
        (**self).drop_scope(scope)
    }

    fn list_scopes(&self) -> StorageResult<Vec<ScopeId>> {
        (**self).list_scopes()
    }
}
