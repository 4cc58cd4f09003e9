//! In-memory document store.

use crate::error::{StorageError, StorageResult};
use crate::scope::{validate_entity_type, ScopeId};
use crate::store::DocumentStore;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory document store.
///
/// This store keeps every scope in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral deployments that don't need persistence
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads. Each `put`
/// replaces the stored `Bytes` under a single write lock, so readers never
/// observe a partial document.
///
/// # Example
///
/// ```rust
/// use crdtsync_storage::{DocumentStore, InMemoryStore, ScopeId};
///
/// let store = InMemoryStore::new();
/// let scope = ScopeId::session("s1").unwrap();
/// store.put(&scope, "todos", vec![1, 2, 3].into()).unwrap();
/// store.drop_scope(&scope).unwrap();
/// assert!(store.get(&scope, "todos").unwrap().is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    scopes: RwLock<HashMap<ScopeId, BTreeMap<String, Bytes>>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the store as closed.
    ///
    /// Every later call fails with [`StorageError::Closed`]. Useful for
    /// exercising storage outages in tests.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Reopens a closed store. Data kept while closed is still there.
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Returns the total number of stored documents across all scopes.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.scopes.read().values().map(BTreeMap::len).sum()
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl DocumentStore for InMemoryStore {
    fn get(&self, scope: &ScopeId, entity_type: &str) -> StorageResult<Option<Bytes>> {
        self.check_open()?;
        Ok(self
            .scopes
            .read()
            .get(scope)
            .and_then(|docs| docs.get(entity_type))
            .cloned())
    }

    fn put(&self, scope: &ScopeId, entity_type: &str, document: Bytes) -> StorageResult<()> {
        self.check_open()?;
        validate_entity_type(entity_type)?;
        self.scopes
            .write()
            .entry(scope.clone())
            .or_default()
            .insert(entity_type.to_string(), document);
        Ok(())
    }

    fn list_entity_types(&self, scope: &ScopeId) -> StorageResult<Vec<String>> {
        self.check_open()?;
        Ok(self
            .scopes
            .read()
            .get(scope)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn drop_scope(&self, scope: &ScopeId) -> StorageResult<()> {
        self.check_open()?;
        self.scopes.write().remove(scope);
        Ok(())
    }

    fn list_scopes(&self) -> StorageResult<Vec<ScopeId>> {
        self.check_open()?;
        let mut scopes: Vec<ScopeId> = self
            .scopes
            .read()
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(scope, _)| scope.clone())
            .collect();
        scopes.sort();
        Ok(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> ScopeId {
        ScopeId::session(name).unwrap()
    }

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.document_count(), 0);
        assert!(store.list_scopes().unwrap().is_empty());
        assert!(store.get(&ScopeId::main(), "todos").unwrap().is_none());
    }

    #[test]
    fn memory_put_is_upsert() {
        let store = InMemoryStore::new();
        let main = ScopeId::main();

        store.put(&main, "todos", Bytes::from_static(b"v1")).unwrap();
        store.put(&main, "todos", Bytes::from_static(b"v2")).unwrap();

        assert_eq!(store.document_count(), 1);
        assert_eq!(store.get(&main, "todos").unwrap().unwrap().as_ref(), b"v2");
    }

    #[test]
    fn memory_scopes_are_isolated() {
        let store = InMemoryStore::new();
        store
            .put(&ScopeId::main(), "todos", Bytes::from_static(b"main"))
            .unwrap();
        store
            .put(&session("a"), "todos", Bytes::from_static(b"a"))
            .unwrap();

        assert_eq!(
            store.get(&session("a"), "todos").unwrap().unwrap().as_ref(),
            b"a"
        );
        assert!(store.get(&session("b"), "todos").unwrap().is_none());
    }

    #[test]
    fn memory_list_entity_types_sorted() {
        let store = InMemoryStore::new();
        let scope = session("a");
        for name in ["todos", "notes", "expenses"] {
            store.put(&scope, name, Bytes::new()).unwrap();
        }
        assert_eq!(
            store.list_entity_types(&scope).unwrap(),
            vec!["expenses", "notes", "todos"]
        );
        assert!(store.list_entity_types(&session("b")).unwrap().is_empty());
    }

    #[test]
    fn memory_drop_scope() {
        let store = InMemoryStore::new();
        store.put(&session("a"), "todos", Bytes::new()).unwrap();
        store.put(&ScopeId::main(), "todos", Bytes::new()).unwrap();

        store.drop_scope(&session("a")).unwrap();
        store.drop_scope(&session("never-existed")).unwrap();

        assert_eq!(store.list_scopes().unwrap(), vec![ScopeId::main()]);
    }

    #[test]
    fn memory_rejects_invalid_entity_type() {
        let store = InMemoryStore::new();
        let result = store.put(&ScopeId::main(), "../escape", Bytes::new());
        assert!(matches!(result, Err(StorageError::InvalidKey { .. })));
    }

    #[test]
    fn memory_closed_store_fails() {
        let store = InMemoryStore::new();
        store.put(&ScopeId::main(), "todos", Bytes::new()).unwrap();
        store.close();

        let err = store.get(&ScopeId::main(), "todos").unwrap_err();
        assert!(matches!(err, StorageError::Closed));
        assert!(err.is_unavailable());

        store.reopen();
        assert!(store.get(&ScopeId::main(), "todos").unwrap().is_some());
    }
}
