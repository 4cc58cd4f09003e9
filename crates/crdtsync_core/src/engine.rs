//! Document engine capability.

use crate::actor::ActorId;
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::record::{Fields, Record, RecordId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the stored document envelope. The envelope wraps the
/// automerge save format.
pub const FORMAT_VERSION: u16 = 1;

/// One local edit to a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Append a record. Its id must be new to the document.
    Insert(Record),
    /// Write the given fields of a live record.
    Update {
        /// Record to edit.
        id: RecordId,
        /// Fields to write. Fields left out keep their current value.
        fields: Fields,
    },
    /// Remove a live record.
    Remove {
        /// Record to remove.
        id: RecordId,
    },
}

/// The mergeable-document capability the session layer is written against.
///
/// Any implementation works as long as it honours these guarantees:
///
/// - `init` returns the same document for the same entity type on every
///   replica, so replicas created independently merge into one
/// - `mutate` returns a new document and never loses an edit already merged in
/// - `merge` is deterministic, commutative, associative and idempotent
/// - `deserialize(serialize(d))` is observably identical to `d`
pub trait DocumentEngine: Send + Sync {
    /// The document value type.
    type Document: Clone + fmt::Debug + Send;

    /// Returns the canonical empty document for an entity type.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot build the document.
    fn init(&self, entity_type: &str) -> CoreResult<Self::Document>;

    /// Applies one local edit made by `actor`.
    ///
    /// # Errors
    ///
    /// Fails if the edit does not fit the document (unknown or reused id).
    fn mutate(
        &self,
        document: &Self::Document,
        actor: ActorId,
        mutation: &Mutation,
    ) -> CoreResult<Self::Document>;

    /// Merges two replicas of the same entity type.
    ///
    /// # Errors
    ///
    /// Fails if the documents belong to different entity types.
    fn merge(&self, left: &Self::Document, right: &Self::Document) -> CoreResult<Self::Document>;

    /// Encodes a document for storage.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be encoded.
    fn serialize(&self, document: &Self::Document) -> CoreResult<Bytes>;

    /// Decodes a stored document.
    ///
    /// # Errors
    ///
    /// Fails if the bytes are not a document this engine can read.
    fn deserialize(&self, bytes: &[u8]) -> CoreResult<Self::Document>;

    /// Returns the live records in list order.
    fn records(&self, document: &Self::Document) -> Vec<Record>;

    /// Returns one live record.
    fn record(&self, document: &Self::Document, id: &RecordId) -> Option<Record>;

    /// Returns an opaque version that changes whenever an edit is recorded.
    fn version(&self, document: &Self::Document) -> u64;
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format: u16,
    document: ciborium::Value,
}

/// [`DocumentEngine`] over automerge record lists.
///
/// Each stored value is a CBOR envelope `{format, document}` whose
/// `document` holds the automerge save bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomergeEngine;

impl AutomergeEngine {
    /// Creates the engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for AutomergeEngine {
    type Document = Document;

    fn init(&self, entity_type: &str) -> CoreResult<Document> {
        Document::new(entity_type)
    }

    fn mutate(&self, document: &Document, actor: ActorId, mutation: &Mutation) -> CoreResult<Document> {
        match mutation {
            Mutation::Insert(record) => document.insert(actor, record),
            Mutation::Update { id, fields } => document.update(actor, id, fields),
            Mutation::Remove { id } => document.remove(actor, id),
        }
    }

    fn merge(&self, left: &Document, right: &Document) -> CoreResult<Document> {
        left.merge(right)
    }

    fn serialize(&self, document: &Document) -> CoreResult<Bytes> {
        let envelope = Envelope {
            format: FORMAT_VERSION,
            document: ciborium::Value::Bytes(document.save()),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&envelope, &mut buf).map_err(|e| CoreError::Encode(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    fn deserialize(&self, bytes: &[u8]) -> CoreResult<Document> {
        let envelope: Envelope =
            ciborium::from_reader(bytes).map_err(|e| CoreError::Decode(e.to_string()))?;
        if envelope.format != FORMAT_VERSION {
            return Err(CoreError::UnsupportedFormat {
                found: envelope.format,
            });
        }
        match envelope.document {
            ciborium::Value::Bytes(bytes) => Document::load(&bytes),
            _ => Err(CoreError::Decode("document is not a byte string".into())),
        }
    }

    fn records(&self, document: &Document) -> Vec<Record> {
        document.records()
    }

    fn record(&self, document: &Document, id: &RecordId) -> Option<Record> {
        document.get(id)
    }

    fn version(&self, document: &Document) -> u64 {
        document.version()
    }
}
