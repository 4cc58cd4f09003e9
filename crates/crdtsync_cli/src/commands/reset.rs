//! Reset command implementation.

use crdtsync_storage::DocumentStore;
use std::path::Path;

/// Runs the reset command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let service = super::open_service(path)?;
    let dropped = service.store().list_scopes()?.len();
    service.reset(None)?;

    let seeded: Vec<String> = service
        .dump_main()?
        .into_iter()
        .map(|doc| format!("{} ({} records)", doc.entity_type, doc.records.len()))
        .collect();

    println!("Reset store at {:?}", path);
    println!("  Dropped scopes: {}", dropped);
    println!("  Main seeded with: {}", seeded.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::commands::open_with;
    use crdtsync_core::RecordId;
    use crdtsync_storage::{DocumentStore, FileStore, ScopeId};
    use tempfile::tempdir;

    #[test]
    fn reset_restores_seed() {
        let dir = tempdir().unwrap();
        {
            let service = open_with(FileStore::open(dir.path()).unwrap(), true).unwrap();
            service.delete("alice", "todos", &RecordId::new("1")).unwrap();
            service.commit("alice", None).unwrap();
            // the process ends without closing alice's session
        }

        super::run(dir.path()).unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.list_scopes().unwrap(), vec![ScopeId::main()]);
        let service = open_with(store, false).unwrap();
        assert_eq!(service.dump_main().unwrap()[0].records.len(), 1);
    }
}
