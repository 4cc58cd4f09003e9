//! Request and response messages.

use crdtsync_core::{Fields, NewRecord, Record, RecordId};
use crdtsync_session::{DocumentDump, EntityCommit, EntityPull, SessionDump};
use serde::{Deserialize, Serialize};

/// A request to the sync server.
///
/// Every request may name the client it acts for; requests that do not are
/// served for the configured default client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ApiRequest {
    /// Open (or return) the client's session.
    #[serde(rename_all = "camelCase")]
    CreateSession {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
    },
    /// Close the client's session, discarding uncommitted edits.
    #[serde(rename_all = "camelCase")]
    CloseSession {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
    },
    /// Push the client's session into main.
    #[serde(rename_all = "camelCase")]
    Commit {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
        /// Entity types to commit; all of the session's when absent.
        #[serde(default)]
        entity_types: Option<Vec<String>>,
    },
    /// Fetch main into the client's session.
    #[serde(rename_all = "camelCase")]
    Pull {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
        /// Entity types to pull; all of the session's when absent.
        #[serde(default)]
        entity_types: Option<Vec<String>>,
    },
    /// List the records of an entity type.
    #[serde(rename_all = "camelCase")]
    ListRecords {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
        /// Entity type.
        entity_type: String,
    },
    /// Add a record.
    #[serde(rename_all = "camelCase")]
    CreateRecord {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
        /// Entity type.
        entity_type: String,
        /// The new record; the id is generated if absent.
        record: NewRecord,
    },
    /// Change fields of a record.
    #[serde(rename_all = "camelCase")]
    UpdateRecord {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
        /// Entity type.
        entity_type: String,
        /// Record to change.
        id: RecordId,
        /// New field values. The whole record may be sent; only changed
        /// fields are written.
        fields: Fields,
    },
    /// Remove a record.
    #[serde(rename_all = "camelCase")]
    DeleteRecord {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
        /// Entity type.
        entity_type: String,
        /// Record to remove.
        id: RecordId,
    },
    /// Drop every session and main, reseed main, then open a session for
    /// the client.
    #[serde(rename_all = "camelCase")]
    Reset {
        /// Acting client.
        #[serde(default)]
        client_id: Option<String>,
    },
    /// Dump main.
    DebugMain,
    /// Dump one client's session.
    #[serde(rename_all = "camelCase")]
    DebugSession {
        /// Client whose session to dump.
        client_id: String,
    },
}

impl ApiRequest {
    /// Returns the request's name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ApiRequest::CreateSession { .. } => "createSession",
            ApiRequest::CloseSession { .. } => "closeSession",
            ApiRequest::Commit { .. } => "commit",
            ApiRequest::Pull { .. } => "pull",
            ApiRequest::ListRecords { .. } => "listRecords",
            ApiRequest::CreateRecord { .. } => "createRecord",
            ApiRequest::UpdateRecord { .. } => "updateRecord",
            ApiRequest::DeleteRecord { .. } => "deleteRecord",
            ApiRequest::Reset { .. } => "reset",
            ApiRequest::DebugMain => "debugMain",
            ApiRequest::DebugSession { .. } => "debugSession",
        }
    }
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub status: u16,
    /// Error message.
    pub error: String,
}

/// A response from the sync server.
///
/// Serialized without a tag; each variant has its own shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    /// The client's session.
    #[serde(rename_all = "camelCase")]
    Session {
        /// Session id.
        session_id: String,
        /// Client the session belongs to.
        client_id: String,
    },
    /// Result of closing a session.
    Closed {
        /// Whether a session existed.
        closed: bool,
    },
    /// Result of a commit.
    Committed {
        /// Per-entity outcome.
        results: Vec<EntityCommit>,
    },
    /// Result of a pull.
    Pulled {
        /// True if every entity type was pulled.
        ok: bool,
        /// Per-entity outcome.
        results: Vec<EntityPull>,
    },
    /// Full record list after a read, update or delete.
    Records {
        /// Live records.
        records: Vec<Record>,
    },
    /// Full record list after an insert.
    #[serde(rename_all = "camelCase")]
    Created {
        /// Id of the new record.
        record_id: RecordId,
        /// Live records.
        records: Vec<Record>,
    },
    /// Dump of main.
    MainDump(Vec<DocumentDump>),
    /// Dump of a session.
    SessionDump(SessionDump),
    /// The request failed.
    Error(ErrorBody),
}

impl ApiResponse {
    /// Returns the HTTP status code for this response.
    pub fn status(&self) -> u16 {
        match self {
            ApiResponse::Error(body) => body.status,
            _ => 200,
        }
    }

    /// Returns true unless this is an error response.
    pub fn is_success(&self) -> bool {
        !matches!(self, ApiResponse::Error(_))
    }
}
