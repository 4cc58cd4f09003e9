//! # crdtsync Storage
//!
//! Scoped document store for crdtsync.
//!
//! A store holds **opaque document blobs** keyed by `(scope, entity type)`.
//! It never interprets the bytes it stores; decoding belongs to the
//! document engine.
//!
//! ## Design Principles
//!
//! - At most one document per `(scope, entity type)` pair
//! - Writes are upserts and atomic per key
//! - Scopes are isolated namespaces (`main` plus one per session)
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryStore`] - For testing and ephemeral deployments
//! - [`FileStore`] - Directory per scope, one file per entity type
//!
//! ## Example
//!
//! ```rust
//! use crdtsync_storage::{DocumentStore, InMemoryStore, ScopeId};
//!
//! let store = InMemoryStore::new();
//! let main = ScopeId::main();
//! store.put(&main, "todos", b"doc".to_vec().into()).unwrap();
//! assert_eq!(store.get(&main, "todos").unwrap().unwrap().as_ref(), b"doc");
//! assert_eq!(store.list_entity_types(&main).unwrap(), vec!["todos".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod file;
mod memory;
mod scope;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use scope::{validate_entity_type, ScopeId, MAIN_SCOPE};
pub use store::DocumentStore;
