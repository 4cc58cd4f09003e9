//! # crdtsync Server
//!
//! Request/response surface for the crdtsync session engine.
//!
//! This crate provides:
//! - Typed request and response messages, JSON on the wire
//! - Client id resolution (explicit id or the configured default)
//! - Error classification into client (4xx) and server (5xx) failures
//! - [`SyncServer`], which dispatches a request to the session engine
//!
//! # Endpoints
//!
//! | Request         | Response                               |
//! |-----------------|----------------------------------------|
//! | `createSession` | `{sessionId, clientId}`                |
//! | `closeSession`  | `{closed}`                             |
//! | `commit`        | `{results: [{entityType, status}]}`    |
//! | `pull`          | `{ok, results}`                        |
//! | `listRecords`   | `{records}`                            |
//! | `createRecord`  | `{recordId, records}`                  |
//! | `updateRecord`  | `{records}`                            |
//! | `deleteRecord`  | `{records}`                            |
//! | `reset`         | `{sessionId, clientId}`                |
//! | `debugMain`     | `[{entityType, version, records}]`     |
//! | `debugSession`  | `{clientId, sessionId, entities, ...}` |
//!
//! Binding the messages to HTTP routes is left to the embedding
//! application; [`SyncServer::handle_json`] returns the status code and
//! body to send.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod messages;
mod server;

pub use config::{ServerConfig, DEFAULT_CLIENT_ID};
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use messages::{ApiRequest, ApiResponse, ErrorBody};
pub use server::SyncServer;
