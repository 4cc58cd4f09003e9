//! CLI command implementations.

pub mod demo;
pub mod inspect;
pub mod reset;

use crdtsync_core::{AutomergeEngine, EntityRegistry};
use crdtsync_session::{SessionConfig, SyncResult, SyncService};
use crdtsync_storage::FileStore;
use std::path::Path;

/// Opens a file-backed service without touching main.
pub(crate) fn open_service(path: &Path) -> Result<SyncService<FileStore, AutomergeEngine>, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No store found at {:?}", path).into());
    }
    let service = open_with(FileStore::open(path)?, false)?;
    Ok(service)
}

pub(crate) fn open_with(store: FileStore, seed: bool) -> SyncResult<SyncService<FileStore, AutomergeEngine>> {
    SyncService::new(
        store,
        AutomergeEngine::new(),
        EntityRegistry::with_builtin(),
        SessionConfig::new().with_seed_on_start(seed),
    )
}
