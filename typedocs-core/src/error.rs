//! Error types and result types for typed document access.
//!
//! Only two failure classes originate in this crate: precondition violations
//! ([`DocumentError::NotFound`], [`DocumentError::MissingEventData`]) and
//! malformed data. Everything else is produced by the native client and
//! passes through unchanged. Use [`DocumentResult<T>`] as the return type for
//! fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when reading or writing typed documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// A document that was required to exist is missing.
    #[error("Document {id} not found in collection {collection}")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// The requested document ID.
        id: String,
    },
    /// A change-event payload lacks a snapshot the extractor needs.
    #[error("Event payload is missing {0}")]
    MissingEventData(String),
    /// A fetched snapshot carried a field outside the declared projection.
    #[error("Document {id} in collection {collection} has field {field} outside the selection")]
    ProjectionMismatch {
        /// Collection the snapshot came from.
        collection: String,
        /// Document ID of the snapshot.
        id: String,
        /// The unexpected field.
        field: String,
    },
    /// Serialization/deserialization error when converting between record and wire formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during client initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The stored document has a shape the requested operation cannot handle.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The query or processing options are unusable.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// A transaction read was invalidated by a concurrent write before commit.
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),
    /// A transaction was used incorrectly or failed to commit.
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// An error reported by the underlying database client.
    #[error("Client error: {0}")]
    Client(String),
}

impl DocumentError {
    /// Builds a [`DocumentError::NotFound`] for the given location.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        DocumentError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Returns `true` if this error reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentError::NotFound { .. })
    }
}

/// A specialized `Result` type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

impl From<BsonError> for DocumentError {
    fn from(err: BsonError) -> Self {
        DocumentError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentError::Serialization(err.to_string())
    }
}
