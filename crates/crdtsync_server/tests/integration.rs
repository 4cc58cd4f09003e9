//! Integration tests for the server over a file-backed store.

use crdtsync_core::{AutomergeEngine, EntityRegistry};
use crdtsync_server::{ApiRequest, ApiResponse, ServerConfig, SyncServer};
use crdtsync_session::{SessionConfig, SyncService};
use crdtsync_storage::FileStore;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn file_server(path: &std::path::Path) -> SyncServer<FileStore, AutomergeEngine> {
    let service = SyncService::new(
        FileStore::open(path).unwrap(),
        AutomergeEngine::new(),
        EntityRegistry::with_builtin(),
        SessionConfig::default(),
    )
    .unwrap();
    SyncServer::new(ServerConfig::default(), service)
}

fn create_todo(client: &str, id: &str) -> String {
    json!({
        "type": "createRecord",
        "clientId": client,
        "entityType": "todos",
        "record": {"id": id, "title": format!("Todo {id}"), "description": "From a test"},
    })
    .to_string()
}

#[test]
fn commits_survive_restart() {
    let dir = tempdir().unwrap();
    {
        let server = file_server(dir.path());
        let (status, _) = server.handle_json(&create_todo("alice", "2"));
        assert_eq!(status, 200);
        let (status, _) = server.handle_json(&json!({"type": "commit", "clientId": "alice"}).to_string());
        assert_eq!(status, 200);
    }

    let server = file_server(dir.path());
    let response = server.handle_message(ApiRequest::ListRecords {
        client_id: Some("bob".into()),
        entity_type: "todos".into(),
    });
    let ApiResponse::Records { records } = response else {
        unreachable!("expected a record list");
    };
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn parallel_clients_all_land_in_main() {
    let dir = tempdir().unwrap();
    let server = Arc::new(file_server(dir.path()));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                let client = format!("client-{i}");
                let (status, _) = server.handle_json(&create_todo(&client, &format!("t{i}")));
                assert_eq!(status, 200);
                let commit = json!({"type": "commit", "clientId": client}).to_string();
                let (status, _) = server.handle_json(&commit);
                assert_eq!(status, 200);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let ApiResponse::MainDump(main) = server.handle_message(ApiRequest::DebugMain) else {
        unreachable!("expected a main dump");
    };
    assert_eq!(main[0].records.len(), 7);
}
