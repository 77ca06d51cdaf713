//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the "document store" capability the
//! pagination core consumes: it queries documents with a filter, a multi-key
//! sort, a projection and a limit, and it reports the canonical identifier
//! type of the store through [`StoreBackend::id_kind`]. The document
//! lifecycle and collection management operations exist so a store can be
//! populated and inspected through the same handle.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the core trait for storage backends
//! - [`DynStoreBackend`]: object-safe mirror used for runtime backend selection
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances

use async_trait::async_trait;
use bson::{Bson, Uuid, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::{any::Any, fmt::Debug};

use crate::{error::DocumentStoreResult, query::Query, value::as_uuid};

/// The canonical identifier type of a store.
///
/// The tiebreak field of every paginated query holds values of this type, and
/// cursor ids are validated against it before they reach the store.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    /// BSON binary subtype 4; canonical string is the hyphenated 36-char form.
    #[default]
    Uuid,
    /// MongoDB ObjectId; canonical string is 24 lowercase hex characters.
    ObjectId,
}

impl IdKind {
    /// Returns true when `raw` is the canonical string form of an id of this kind.
    pub fn is_valid(&self, raw: &str) -> bool {
        self.parse(raw).is_some()
    }

    /// Parses a canonical id string into its BSON value.
    pub fn parse(&self, raw: &str) -> Option<Bson> {
        match self {
            IdKind::Uuid => {
                if raw.len() != 36 {
                    return None;
                }
                Uuid::parse_str(raw).ok().map(Bson::from)
            }
            IdKind::ObjectId => {
                if raw.len() != 24 {
                    return None;
                }
                ObjectId::parse_str(raw).ok().map(Bson::ObjectId)
            }
        }
    }

    /// Renders a stored id value in its canonical string form.
    ///
    /// Returns `None` if the value is not an id of this kind.
    pub fn canonical(&self, value: &Bson) -> Option<String> {
        match (self, value) {
            (IdKind::Uuid, value) => as_uuid(value).map(|uuid| uuid.to_string()),
            (IdKind::ObjectId, Bson::ObjectId(oid)) => Some(oid.to_hex()),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IdKind::Uuid => "uuid",
            IdKind::ObjectId => "objectid",
        }
    }
}

impl std::str::FromStr for IdKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "uuid" => Ok(IdKind::Uuid),
            "objectid" => Ok(IdKind::ObjectId),
            other => Err(format!("unknown id kind '{other}' (expected uuid or objectid)")),
        }
    }
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single backend is shared by any
/// number of concurrent requests.
///
/// # Cancellation
///
/// Callers cancel an operation by dropping its future. Implementations must
/// not detach work that outlives the returned future.
///
/// # Identifiers
///
/// Documents are stored under a UUID and every returned document carries
/// that id in its `_id` field.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection, creating the collection if needed.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Replaces existing documents in a collection.
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Deletes documents from a collection by their IDs.
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()>;

    /// Retrieves documents by id. Missing ids are omitted from the result.
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Queries documents in a collection.
    ///
    /// Results are ordered by `query.sort` (earlier keys first), reduced by
    /// `query.projection` and bounded by `query.limit`. A collection that
    /// does not exist yields no documents.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Creates an empty collection.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all of its documents.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// The canonical identifier type of the documents this store returns.
    fn id_kind(&self) -> IdKind {
        IdKind::Uuid
    }

    /// Releases the backend's resources.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe counterpart of [`StoreBackend`], blanket implemented for every backend.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()>;
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    fn id_kind(&self) -> IdKind;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        StoreBackend::update_documents(self, documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::delete_documents(self, ids, collection).await
    }

    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::get_documents(self, ids, collection).await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    fn id_kind(&self) -> IdKind {
        StoreBackend::id_kind(self)
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_round_trip_through_canonical_form() {
        let raw = "0191e2a8-7b3c-7def-8a12-3456789abcde";
        let value = IdKind::Uuid.parse(raw).unwrap();

        assert_eq!(IdKind::Uuid.canonical(&value).as_deref(), Some(raw));
        assert!(IdKind::Uuid.canonical(&Bson::String(raw.into())).is_none());
    }

    #[test]
    fn object_ids_must_be_24_hex_characters() {
        assert!(IdKind::ObjectId.is_valid("65a1b2c3d4e5f60718293a4b"));
        assert!(!IdKind::ObjectId.is_valid("not-an-id"));
        assert!(!IdKind::ObjectId.is_valid("65a1b2c3d4e5f60718293a4"));
        assert!(!IdKind::ObjectId.is_valid("65a1b2c3d4e5f60718293a4g"));
    }

    #[test]
    fn uuid_ids_reject_compact_and_garbage_forms() {
        assert!(!IdKind::Uuid.is_valid("not-an-id"));
        assert!(!IdKind::Uuid.is_valid("0191e2a87b3c7def8a123456789abcde"));
        assert!(IdKind::Uuid.is_valid("0191e2a8-7b3c-7def-8a12-3456789abcde"));
    }
}
