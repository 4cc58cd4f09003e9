//! Error types for crdtsync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building, mutating or decoding documents.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Failed to encode a document.
    #[error("encoding failed: {0}")]
    Encode(String),

    /// Stored bytes are not a valid document.
    #[error("decoding failed: {0}")]
    Decode(String),

    /// Stored document uses a format this build cannot read.
    #[error("unsupported document format version {found}")]
    UnsupportedFormat {
        /// Version found in the stored envelope.
        found: u16,
    },

    /// Automerge rejected an edit or a merge.
    #[error("document engine failed: {0}")]
    Engine(#[from] automerge::AutomergeError),

    /// Two documents of different entity types were merged.
    #[error("cannot merge a {left:?} document with a {right:?} document")]
    EntityTypeMismatch {
        /// Entity type of the left document.
        left: String,
        /// Entity type of the right document.
        right: String,
    },

    /// Insert of a record id the document has already seen.
    #[error("record {id} already exists in {entity_type}")]
    DuplicateRecord {
        /// Entity type of the document.
        entity_type: String,
        /// The reused id.
        id: String,
    },

    /// No live record with this id.
    #[error("record {id} not found in {entity_type}")]
    RecordNotFound {
        /// Entity type of the document.
        entity_type: String,
        /// The missing id.
        id: String,
    },

    /// A record is missing a field its entity type requires.
    #[error("{entity_type} record is missing required field {field:?}")]
    MissingField {
        /// Entity type being validated.
        entity_type: String,
        /// Name of the missing field.
        field: String,
    },

    /// A value cannot be interpreted as a record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl CoreError {
    /// Returns true if the error came from decoding stored bytes.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            CoreError::Decode(_) | CoreError::UnsupportedFormat { .. }
        )
    }
}
