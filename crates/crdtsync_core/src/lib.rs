//! # crdtsync Core
//!
//! Mergeable record documents for crdtsync.
//!
//! This crate provides:
//! - [`Record`] and [`RecordId`], the addressable unit inside a document
//! - [`Document`], a record list held in an automerge document (one per
//!   entity type)
//! - [`DocumentEngine`], the capability the session layer is written
//!   against, and [`AutomergeEngine`], its implementation over [`Document`]
//! - [`EntityRegistry`], the table of known entity types
//!
//! ## Merge guarantees
//!
//! For two documents of the same entity type, merge is:
//! - commutative: `merge(a, b) == merge(b, a)`
//! - associative: `merge(merge(a, b), c) == merge(a, merge(b, c))`
//! - idempotent: `merge(a, a) == a`
//!
//! Merge is automerge's: concurrent writes to one field resolve by operation
//! id (counter, then actor). A removal deletes the list element, so it wins
//! over concurrent field updates of the record.
//!
//! ## Usage
//!
//! ```
//! use crdtsync_core::{ActorId, AutomergeEngine, DocumentEngine, Mutation, Record};
//! use serde_json::json;
//!
//! let engine = AutomergeEngine::new();
//! let doc = engine.init("todos").unwrap();
//! let record = Record::from_value(json!({"id": "1", "title": "Buy milk"})).unwrap();
//! let doc = engine.mutate(&doc, ActorId::new(), &Mutation::Insert(record)).unwrap();
//!
//! let bytes = engine.serialize(&doc).unwrap();
//! let loaded = engine.deserialize(&bytes).unwrap();
//! assert_eq!(engine.records(&loaded).len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod actor;
mod document;
mod engine;
mod error;
mod record;
mod registry;

pub use actor::ActorId;
pub use document::Document;
pub use engine::{AutomergeEngine, DocumentEngine, Mutation, FORMAT_VERSION};
pub use error::{CoreError, CoreResult};
pub use record::{diff_fields, Fields, NewRecord, Record, RecordId, ID_FIELD};
pub use registry::{EntityDescriptor, EntityRegistry, TODOS};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
