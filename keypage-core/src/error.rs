//! Error types and result types for document store and pagination operations.
//!
//! Two layers of errors live here:
//!
//! - [`DocumentStoreError`] is what storage backends report. Use
//!   [`DocumentStoreResult<T>`] as the return type for backend operations.
//! - [`PaginationError`] is the stable, tagged error surface of the keyset
//!   pagination core. Backend failures are wrapped into
//!   [`PaginationError::StoreUnavailable`] so callers see the same taxonomy
//!   regardless of the store implementation.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// This enum covers serialization errors, document lifecycle issues, collection management,
/// and backend-specific errors.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization, configuration or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document has an invalid structure (e.g. it is not a BSON document).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A query could not be expressed by the backend.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// Errors produced by a keyset pagination request.
///
/// Every variant carries a stable tag (see [`PaginationError::kind`]) and a
/// human readable message. A failed request never yields a partial page.
#[derive(Error, Debug)]
pub enum PaginationError {
    /// No sort fields were supplied, so the ordering cannot be made deterministic.
    #[error("a sort specification with at least one field is required for keyset pagination")]
    MissingSortSpec,
    /// A sort field's direction is not one of the recognized values.
    #[error("invalid sort direction {direction} for field '{field}' (expected 1, -1, \"asc\" or \"desc\")")]
    InvalidSortDirection {
        field: String,
        direction: String,
    },
    /// The supplied cursor could not be decoded or its id is not a valid identifier.
    #[error("malformed cursor: {0}")]
    MalformedCursor(String),
    /// The requested page size is larger than the configured maximum.
    #[error("limit {requested} exceeds the maximum page size of {max}")]
    LimitExceeded {
        requested: usize,
        max: usize,
    },
    /// The requested page size is zero.
    #[error("limit must be a positive integer")]
    InvalidLimit,
    /// The collection name is empty or violates the store's naming rules.
    #[error("invalid collection name '{name}': {reason}")]
    InvalidCollection {
        name: String,
        reason: String,
    },
    /// A sort or tiebreak value cannot be ordered consistently with the generated comparisons.
    #[error("incompatible sort value for field '{field}': {reason}")]
    IncompatibleSortValue {
        field: String,
        reason: String,
    },
    /// A fetched document could not be converted into the requested type.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    /// Caller supplied arguments could not be decoded.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The underlying store call failed.
    #[error("document store unavailable: {0}")]
    StoreUnavailable(#[source] DocumentStoreError),
}

impl PaginationError {
    /// Returns the stable taxonomy tag of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            PaginationError::MissingSortSpec => "MissingSortSpec",
            PaginationError::InvalidSortDirection { .. } => "InvalidSortDirection",
            PaginationError::MalformedCursor(_) => "MalformedCursor",
            PaginationError::LimitExceeded { .. } => "LimitExceeded",
            PaginationError::InvalidLimit => "InvalidLimit",
            PaginationError::InvalidCollection { .. } => "InvalidCollection",
            PaginationError::IncompatibleSortValue { .. } => "IncompatibleSortValue",
            PaginationError::InvalidDocument(_) => "InvalidDocument",
            PaginationError::InvalidArguments(_) => "InvalidArguments",
            PaginationError::StoreUnavailable(_) => "StoreUnavailable",
        }
    }
}

/// A specialized `Result` type for pagination requests.
pub type PaginationResult<T> = Result<T, PaginationError>;
