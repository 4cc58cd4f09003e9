//! Demo command implementation.
//!
//! Two clients edit independent session replicas of the seeded todo list;
//! one commits, the other pulls and ends up with both records.

use crate::Format;
use crdtsync_core::{AutomergeEngine, Fields, NewRecord, Record};
use crdtsync_session::{CommitStatus, PullStatus, SyncResult, SyncService};
use crdtsync_storage::{DocumentStore, FileStore};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// One step of the demo and the list it left behind.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoStep {
    /// What happened.
    pub action: String,
    /// Client whose list is shown.
    pub client_id: String,
    /// That client's records after the step.
    pub records: Vec<Record>,
}

/// Runs the demo command.
pub fn run(path: Option<&Path>, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let steps = match path {
        Some(path) => {
            let store = FileStore::open(path)?;
            scenario(&super::open_with(store, true)?)?
        }
        None => scenario(&SyncService::in_memory()?)?,
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&steps)?),
        Format::Text => {
            for (n, step) in steps.iter().enumerate() {
                println!("{}. {}", n + 1, step.action);
                println!("   {} sees:", step.client_id);
                for record in &step.records {
                    println!("     {}", record.to_value());
                }
            }
        }
    }
    Ok(())
}

/// Plays the two-session scenario against `service`.
pub fn scenario<S: DocumentStore>(
    service: &SyncService<S, AutomergeEngine>,
) -> SyncResult<Vec<DemoStep>> {
    let mut steps = Vec::new();
    let mut step = |action: String, client_id: &str, records: Vec<Record>| {
        info!(client_id, %action, "demo step");
        steps.push(DemoStep {
            action,
            client_id: client_id.to_string(),
            records,
        });
    };

    let a = service.create_session("client-a")?;
    step(
        format!("client-a opens session {}", a.session_id),
        "client-a",
        service.read("client-a", "todos")?,
    );

    let fields: Fields = json!({"title": "Buy eggs", "description": "A dozen, free range"})
        .as_object()
        .cloned()
        .unwrap_or_default();
    let added = service.add("client-a", "todos", NewRecord::new(fields))?;
    step(
        format!("client-a adds record {}", added.id),
        "client-a",
        added.records,
    );

    let b = service.create_session("client-b")?;
    step(
        format!("client-b opens session {}", b.session_id),
        "client-b",
        service.read("client-b", "todos")?,
    );

    let committed = service.commit("client-a", None)?;
    let merged = committed.status("todos") == Some(&CommitStatus::Merged);
    step(
        format!("client-a commits (todos merged: {merged})"),
        "client-a",
        service.read("client-a", "todos")?,
    );

    let pulled = service.pull("client-b", None)?;
    let merged = pulled.status("todos") == Some(&PullStatus::Merged);
    step(
        format!("client-b pulls (todos merged: {merged})"),
        "client-b",
        service.read("client-b", "todos")?,
    );

    service.close_session("client-a")?;
    service.close_session("client-b")?;
    Ok(steps)
}
