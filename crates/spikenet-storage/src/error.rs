//! Error types for the identifier factory and the persistence cache.

use thiserror::Error;

use crate::ids::EntityKind;

/// Result type for storage-layer operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors produced by the id factory and the persistence collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No id was available in the requested kind's range.
    #[error("id range exhausted for kind {kind}")]
    IdRangeExhausted {
        /// The kind whose range is exhausted.
        kind: EntityKind,
    },

    /// A lookup resolved to no known entity.
    #[error("unknown id {id}")]
    UnknownId {
        /// The id that could not be resolved.
        id: u64,
    },

    /// A JSON payload's `type` tag did not match the kind the caller expected,
    /// or the payload otherwise failed to parse as a known entity shape.
    #[error("serialization mismatch: {reason}")]
    SerializationMismatch {
        /// Description of the mismatch.
        reason: String,
    },

    /// No deserialization factory was registered for the given type name.
    #[error("no factory registered for type {type_name}")]
    UnregisteredType {
        /// The `type` tag that had no matching factory.
        type_name: String,
    },

    /// The backing key-value store failed to service a read or write.
    #[error("backend error: {reason}")]
    Backend {
        /// Description of the backend failure.
        reason: String,
    },
}

impl StorageError {
    /// Construct an [`StorageError::UnknownId`].
    pub fn unknown_id(id: u64) -> Self {
        Self::UnknownId { id }
    }

    /// Construct a [`StorageError::SerializationMismatch`].
    pub fn mismatch(reason: impl Into<String>) -> Self {
        Self::SerializationMismatch {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationMismatch {
            reason: err.to_string(),
        }
    }
}
