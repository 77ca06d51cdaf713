//! Typed documents.
//!
//! Pagination itself works on schemaless BSON documents. The [`Document`]
//! trait lets callers insert and page through their own serde types instead.

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreResult;

/// A type that can be stored in a collection.
///
/// ```ignore
/// use keypage::document::Document;
/// use bson::{DateTime, Uuid};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Event {
///     pub id: Uuid,
///     pub date: DateTime,
/// }
///
/// impl Document for Event {
///     fn id(&self) -> &Uuid { &self.id }
///     fn collection_name() -> &'static str { "events" }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// The document's unique identifier, stored as `_id`.
    fn id(&self) -> &Uuid;

    /// The name of the collection this document type lives in.
    fn collection_name() -> &'static str;
}

/// BSON conversions, implemented for every [`Document`].
pub trait DocumentExt: Document {
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Deserializes a stored document. Fields the type does not declare,
    /// such as `_id`, are ignored unless the type denies unknown fields.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}
