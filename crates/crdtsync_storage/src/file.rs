//! File-based document store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::scope::{validate_entity_type, ScopeId};
use crate::store::DocumentStore;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DOC_EXTENSION: &str = "doc";
const TMP_EXTENSION: &str = "doc.tmp";

/// A file-based document store.
///
/// Layout: one directory per scope under the root, one `<entity>.doc`
/// file per entity type inside it. Data survives process restarts.
///
/// # Durability
///
/// `put` writes to a temporary sibling file, calls `File::sync_all()`,
/// renames it over the target and syncs the scope directory. A crash or I/O
/// error before the rename leaves the previous document in place. If only
/// the directory sync fails, `put` returns the error with the new document
/// visible but not known to survive a crash.
///
/// # Thread Safety
///
/// The store is thread-safe. Writers and scope drops are serialized by an
/// internal lock; readers go straight to the file system, which is safe
/// because `rename` replaces the file atomically.
///
/// # Example
///
/// ```no_run
/// use crdtsync_storage::{DocumentStore, FileStore, ScopeId};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("data")).unwrap();
/// store.put(&ScopeId::main(), "todos", vec![0xA0].into()).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens or creates a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created, or if
    /// `root` exists and is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(StorageError::Corrupted(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn scope_dir(&self, scope: &ScopeId) -> PathBuf {
        self.root.join(scope.as_str())
    }

    fn document_path(&self, scope: &ScopeId, entity_type: &str) -> PathBuf {
        self.scope_dir(scope)
            .join(format!("{entity_type}.{DOC_EXTENSION}"))
    }
}

impl DocumentStore for FileStore {
    fn get(&self, scope: &ScopeId, entity_type: &str) -> StorageResult<Option<Bytes>> {
        validate_entity_type(entity_type)?;
        match fs::read(self.document_path(scope, entity_type)) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, scope: &ScopeId, entity_type: &str, document: Bytes) -> StorageResult<()> {
        validate_entity_type(entity_type)?;
        let _guard = self.write_lock.lock();

        let dir = self.scope_dir(scope);
        fs::create_dir_all(&dir)?;

        let target = self.document_path(scope, entity_type);
        let tmp = dir.join(format!("{entity_type}.{TMP_EXTENSION}"));
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&document)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        sync_dir(&dir)?;
        Ok(())
    }

    fn list_entity_types(&self, scope: &ScopeId) -> StorageResult<Vec<String>> {
        let entries = match fs::read_dir(self.scope_dir(scope)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOC_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn drop_scope(&self, scope: &ScopeId) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        match fs::remove_dir_all(self.scope_dir(scope)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_scopes(&self) -> StorageResult<Vec<ScopeId>> {
        let mut scopes = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(scope) = ScopeId::parse(name) else {
                continue;
            };
            if !self.list_entity_types(&scope)?.is_empty() {
                scopes.push(scope);
            }
        }
        scopes.sort();
        Ok(scopes)
    }
}

/// Syncs a directory so a rename inside it is durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

/// NTFS journals metadata; directories cannot be synced on Windows.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn directory_sync_reports_errors() {
        let dir = tempdir().unwrap();
        assert!(sync_dir(dir.path()).is_ok());
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn file_open_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("store");

        let store = FileStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.path(), root);
        assert!(store.list_scopes().unwrap().is_empty());
    }

    #[test]
    fn file_put_and_get() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let main = ScopeId::main();

        assert!(store.get(&main, "todos").unwrap().is_none());
        store.put(&main, "todos", Bytes::from_static(b"first")).unwrap();
        store.put(&main, "todos", Bytes::from_static(b"second")).unwrap();

        assert_eq!(store.get(&main, "todos").unwrap().unwrap().as_ref(), b"second");
        assert!(!dir.path().join("main").join("todos.doc.tmp").exists());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let scope = ScopeId::session("abc").unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put(&scope, "todos", Bytes::from_static(b"durable")).unwrap();
        }

        {
            let store = FileStore::open(dir.path()).unwrap();
            assert_eq!(store.get(&scope, "todos").unwrap().unwrap().as_ref(), b"durable");
            assert_eq!(store.list_scopes().unwrap(), vec![scope]);
        }
    }

    #[test]
    fn file_list_entity_types_ignores_temp_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let main = ScopeId::main();

        store.put(&main, "todos", Bytes::new()).unwrap();
        store.put(&main, "notes", Bytes::new()).unwrap();
        fs::write(dir.path().join("main").join("stale.doc.tmp"), b"junk").unwrap();

        assert_eq!(store.list_entity_types(&main).unwrap(), vec!["notes", "todos"]);
    }

    #[test]
    fn file_drop_scope() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let scope = ScopeId::session("abc").unwrap();

        store.put(&scope, "todos", Bytes::new()).unwrap();
        store.drop_scope(&scope).unwrap();
        store.drop_scope(&scope).unwrap();

        assert!(store.get(&scope, "todos").unwrap().is_none());
        assert!(!dir.path().join("abc").exists());
    }

    #[test]
    fn file_rejects_invalid_entity_type() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let result = store.put(&ScopeId::main(), "a/b", Bytes::new());
        assert!(matches!(result, Err(StorageError::InvalidKey { .. })));
    }
}
