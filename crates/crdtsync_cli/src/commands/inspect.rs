//! Inspect command implementation.

use crate::Format;
use crdtsync_core::Record;
use crdtsync_session::DocumentDump;
use crdtsync_storage::{DocumentStore, ScopeId};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Total encoded size of every document in bytes.
    pub total_size: u64,
    /// Main first, then any session scopes left on disk.
    pub scopes: Vec<ScopeReport>,
}

/// One scope of the store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeReport {
    /// Scope name.
    pub name: String,
    /// True for the main scope.
    pub main: bool,
    /// Documents in the scope.
    pub documents: Vec<DocumentReport>,
}

/// One stored document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    /// Entity type.
    pub entity_type: String,
    /// Encoded size in bytes.
    pub size: u64,
    /// Document version, absent if it failed to load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Number of live records.
    pub record_count: usize,
    /// Live records (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    /// Load error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_records: bool, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_records)?;

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Text => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects the inspection result without printing it.
pub fn inspect(path: &Path, show_records: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let service = super::open_service(path)?;
    let store = service.store();

    let mut scopes = store.list_scopes()?;
    // main first, sessions by name
    scopes.sort_by_key(|scope| (!scope.is_main(), scope.as_str().to_string()));

    let mut result = InspectResult {
        path: path.display().to_string(),
        total_size: 0,
        scopes: Vec::with_capacity(scopes.len()),
    };

    for scope in scopes {
        let mut documents = Vec::new();
        for dump in service.dump_scope(&scope)? {
            let size = document_size(store, &scope, &dump.entity_type)?;
            result.total_size += size;
            documents.push(report(dump, size, show_records));
        }
        result.scopes.push(ScopeReport {
            name: scope.to_string(),
            main: scope.is_main(),
            documents,
        });
    }

    Ok(result)
}

fn document_size(
    store: &impl DocumentStore,
    scope: &ScopeId,
    entity_type: &str,
) -> Result<u64, Box<dyn std::error::Error>> {
    Ok(store
        .get(scope, entity_type)?
        .map(|bytes| bytes.len() as u64)
        .unwrap_or(0))
}

fn report(dump: DocumentDump, size: u64, show_records: bool) -> DocumentReport {
    DocumentReport {
        entity_type: dump.entity_type,
        size,
        version: dump.version,
        record_count: dump.records.len(),
        records: show_records.then_some(dump.records),
        error: dump.error,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("crdtsync Store Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!("Total size: {} bytes", format_size(result.total_size));

    for scope in &result.scopes {
        println!();
        if scope.main {
            println!("Scope {} (main):", scope.name);
        } else {
            println!("Scope {} (session, left from an earlier run):", scope.name);
        }
        if scope.documents.is_empty() {
            println!("  (empty)");
        }
        for doc in &scope.documents {
            match (&doc.error, doc.version) {
                (Some(error), _) => println!("  {}: ERROR: {}", doc.entity_type, error),
                (None, Some(version)) => println!(
                    "  {}: {} records, version {}, {} bytes",
                    doc.entity_type,
                    doc.record_count,
                    version,
                    format_size(doc.size)
                ),
                (None, None) => println!("  {}: {} records", doc.entity_type, doc.record_count),
            }
            if let Some(records) = &doc.records {
                for record in records {
                    println!("    {}", record.to_value());
                }
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::open_with;
    use crdtsync_storage::FileStore;
    use tempfile::tempdir;

    #[test]
    fn inspect_seeded_store() {
        let dir = tempdir().unwrap();
        open_with(FileStore::open(dir.path()).unwrap(), true).unwrap();

        let result = inspect(dir.path(), true).unwrap();
        assert_eq!(result.scopes.len(), 1);
        assert!(result.scopes[0].main);
        let todos = &result.scopes[0].documents[0];
        assert_eq!(todos.entity_type, "todos");
        assert_eq!(todos.record_count, 1);
        assert!(todos.size > 0);
        assert_eq!(result.total_size, todos.size);
        assert_eq!(todos.records.as_ref().unwrap()[0].id.as_str(), "1");
    }

    #[test]
    fn inspect_does_not_seed() {
        let dir = tempdir().unwrap();
        let result = inspect(dir.path(), false).unwrap();
        assert!(result.scopes.is_empty());
        assert!(FileStore::open(dir.path()).unwrap().list_scopes().unwrap().is_empty());
    }

    #[test]
    fn inspect_reports_broken_documents() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store
            .put(&ScopeId::main(), "todos", b"garbage".to_vec().into())
            .unwrap();

        let result = inspect(dir.path(), false).unwrap();
        let doc = &result.scopes[0].documents[0];
        assert!(doc.error.is_some());
        assert_eq!(doc.record_count, 0);
    }

    #[test]
    fn missing_store() {
        let dir = tempdir().unwrap();
        assert!(inspect(&dir.path().join("nope"), false).is_err());
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
