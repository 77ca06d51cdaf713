//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON values in HashMaps behind an async-aware
//! read-write lock, keyed by the caller's UUID. In UUID mode (the default)
//! every stored document carries that UUID in `_id` (BSON binary subtype 4);
//! in ObjectId mode `_id` holds an ObjectId instead.
//!
//! Writes are all-or-nothing: every document of a batch is checked before
//! the collection is touched.

use async_trait::async_trait;
use bson::{Bson, Document, Uuid, oid::ObjectId};
use mea::rwlock::RwLock;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use keypage_core::{
    backend::{IdKind, StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Query,
    value::type_name,
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

type CollectionMap = HashMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and shares its state through an `Arc`, so
/// clones see the same collections.
///
/// Queries scan every document of a collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use keypage_memory::InMemoryStore;
/// use keypage::backend::StoreBackend;
/// use bson::{Uuid, Bson, doc};
///
/// let store = InMemoryStore::new();
/// let id = Uuid::new();
/// store.insert_documents(vec![(id, Bson::Document(doc! { "name": "Alice" }))], "users").await?;
///
/// let docs = store.get_documents(vec![id], "users").await?;
/// assert_eq!(docs[0].as_document().unwrap().get("_id"), Some(&Bson::from(id)));
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
    id_kind: IdKind,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Stores ObjectId (or UUID) `_id`s and pages with them as the tiebreak.
    ///
    /// In ObjectId mode an ObjectId `_id` supplied on insert is kept, a
    /// missing one is generated, and updates never change a stored `_id`.
    pub fn with_id_kind(mut self, id_kind: IdKind) -> Self {
        self.id_kind = id_kind;
        self
    }

    /// Converts an incoming document into its stored form.
    ///
    /// `stored` is the document being replaced, if any.
    fn stored_form(
        &self,
        id: Uuid,
        document: Bson,
        collection: &str,
        stored: Option<&Document>,
    ) -> DocumentStoreResult<Document> {
        let Bson::Document(mut document) = document else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "document {id} for collection {collection} is not a BSON document"
            )));
        };

        let stored_id = match self.id_kind {
            IdKind::Uuid => Bson::from(id),
            IdKind::ObjectId => match (stored.and_then(|stored| stored.get("_id")), document.get("_id")) {
                (Some(existing), _) => existing.clone(),
                (None, Some(Bson::ObjectId(oid))) => Bson::ObjectId(*oid),
                (None, Some(other)) => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "document {id} for collection {collection} has a {} _id, expected an ObjectId",
                        type_name(other)
                    )));
                }
                (None, None) => Bson::ObjectId(ObjectId::new()),
            },
        };

        document.insert("_id", stored_id);
        Ok(document)
    }
}

fn object_id(document: &Document) -> Option<ObjectId> {
    document.get_object_id("_id").ok()
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let existing = store.get(collection);

        let mut keys = HashSet::new();
        let mut object_ids = existing
            .filter(|_| self.id_kind == IdKind::ObjectId)
            .map(|map| map.values().filter_map(object_id).collect::<HashSet<_>>())
            .unwrap_or_default();
        let mut prepared = Vec::with_capacity(documents.len());

        for (id, doc) in documents {
            let key = id.to_string();
            if existing.is_some_and(|map| map.contains_key(&key)) || !keys.insert(key.clone()) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
            }

            let document = self.stored_form(id, doc, collection, None)?;
            if let Some(oid) = object_id(&document) {
                if !object_ids.insert(oid) {
                    return Err(DocumentStoreError::DocumentAlreadyExists(oid.to_hex(), collection.to_string()));
                }
            }

            prepared.push((key, document));
        }

        store
            .entry(collection.to_string())
            .or_default()
            .extend(prepared);

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        let mut prepared = Vec::with_capacity(documents.len());
        for (id, doc) in documents {
            let key = id.to_string();

            let Some(stored) = collection_map.get(&key) else {
                return Err(DocumentStoreError::DocumentNotFound(key, collection.to_string()));
            };

            let document = self.stored_form(id, doc, collection, Some(stored))?;
            prepared.push((key, document));
        }

        collection_map.extend(prepared);

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        let keys = ids.iter().map(Uuid::to_string).collect::<Vec<_>>();
        if let Some(missing) = keys.iter().find(|key| !collection_map.contains_key(*key)) {
            return Err(DocumentStoreError::DocumentNotFound(missing.clone(), collection.to_string()));
        }

        for key in &keys {
            collection_map.remove(key);
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection_map.get(&id.to_string()))
            .cloned()
            .map(Bson::Document)
            .collect())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            tracing::trace!(collection, "query on missing collection");
            return Ok(vec![]);
        };

        let mut matched = Vec::new();
        for document in collection_map.values() {
            let keep = match &query.filter {
                Some(filter) => DocumentEvaluator::new(document).evaluate(filter)?,
                None => true,
            };
            if keep {
                matched.push(document);
            }
        }

        if !query.sort.is_empty() {
            matched.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        let documents = matched
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match &query.projection {
                Some(projection) => Bson::Document(projection.apply(document)),
                None => Bson::Document(document.clone()),
            })
            .collect::<Vec<_>>();

        tracing::trace!(
            collection,
            scanned = collection_map.len(),
            returned = documents.len(),
            "in-memory query"
        );

        Ok(documents)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    fn id_kind(&self) -> IdKind {
        self.id_kind
    }
}

/// Builder for [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    id_kind: IdKind,
}

impl InMemoryStoreBuilder {
    pub fn with_id_kind(mut self, id_kind: IdKind) -> Self {
        self.id_kind = id_kind;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new().with_id_kind(self.id_kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use keypage_core::{
        query::{Filter, Projection, SortDirection},
        value::get_path,
    };

    async fn seeded() -> (InMemoryStore, Vec<Uuid>) {
        let store = InMemoryStore::new();
        let ids = (0..4).map(|_| Uuid::new()).collect::<Vec<_>>();
        let documents = ids
            .iter()
            .zip([3, 1, 2, 1])
            .map(|(id, rank)| {
                let score = rank * 10;
                (*id, Bson::Document(doc! { "rank": rank, "meta": { "tag": "t", "score": score } }))
            })
            .collect();

        store.insert_documents(documents, "items").await.unwrap();
        (store, ids)
    }

    fn field<'a>(document: &'a Bson, path: &str) -> Option<&'a Bson> {
        get_path(document.as_document().unwrap(), path)
    }

    #[tokio::test]
    async fn stored_documents_carry_their_id() {
        let (store, ids) = seeded().await;

        let documents = store.get_documents(vec![ids[0]], "items").await.unwrap();

        assert_eq!(field(&documents[0], "_id"), Some(&Bson::from(ids[0])));
    }

    #[tokio::test]
    async fn sorts_on_every_key_in_order() {
        let (store, ids) = seeded().await;
        let (low, high) = if ids[1].to_string() < ids[3].to_string() { (ids[1], ids[3]) } else { (ids[3], ids[1]) };

        let query = Query::builder()
            .sort("rank", SortDirection::Asc)
            .sort("_id", SortDirection::Asc)
            .build();
        let documents = store.query_documents(query, "items").await.unwrap();

        let ranks = documents
            .iter()
            .map(|document| field(document, "rank").cloned().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ranks, vec![Bson::Int32(1), Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)]);
        assert_eq!(field(&documents[0], "_id"), Some(&Bson::from(low)));
        assert_eq!(field(&documents[1], "_id"), Some(&Bson::from(high)));
    }

    #[tokio::test]
    async fn filters_and_limits_apply_before_projection() {
        let (store, _) = seeded().await;

        let query = Query::builder()
            .filter(Filter::gte("meta.score", 20))
            .sort("rank", SortDirection::Desc)
            .projection(Some(Projection::new().include("meta.score")))
            .limit(1)
            .build();
        let documents = store.query_documents(query, "items").await.unwrap();

        assert_eq!(documents.len(), 1);
        let document = documents[0].as_document().unwrap();
        assert_eq!(get_path(document, "meta.score"), Some(&Bson::Int32(30)));
        assert!(get_path(document, "meta.tag").is_none());
        assert!(document.get("rank").is_none());
        assert!(document.get("_id").is_some());
    }

    #[tokio::test]
    async fn exclusion_projections_drop_paths() {
        let (store, _) = seeded().await;

        let query = Query::builder()
            .projection(Some(Projection::new().exclude("meta").exclude("_id")))
            .build();
        let documents = store.query_documents(query, "items").await.unwrap();

        assert_eq!(documents.len(), 4);
        for document in &documents {
            let document = document.as_document().unwrap();
            assert!(document.get("meta").is_none());
            assert!(document.get("_id").is_none());
            assert!(document.get("rank").is_some());
        }
    }

    #[tokio::test]
    async fn missing_collections_are_empty() {
        let store = InMemoryStore::new();

        assert!(store.query_documents(Query::new(), "nothing").await.unwrap().is_empty());
        assert!(matches!(
            store.drop_collection("nothing").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_inserts_are_rejected() {
        let (store, ids) = seeded().await;

        let err = store
            .insert_documents(vec![(ids[0], Bson::Document(doc! {}))], "items")
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
    }

    #[tokio::test]
    async fn non_documents_are_rejected() {
        let store = InMemoryStore::new();

        let err = store
            .insert_documents(vec![(Uuid::new(), Bson::Int32(1))], "items")
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn failed_inserts_write_nothing() {
        let (store, ids) = seeded().await;
        let fresh = Uuid::new();

        let err = store
            .insert_documents(
                vec![(fresh, Bson::Document(doc! { "rank": 9 })), (ids[0], Bson::Document(doc! {}))],
                "items",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
        assert!(store.get_documents(vec![fresh], "items").await.unwrap().is_empty());

        let err = store
            .insert_documents(vec![(fresh, Bson::Document(doc! {})), (fresh, Bson::Document(doc! {}))], "fresh")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));

        let err = store
            .insert_documents(vec![(fresh, Bson::Document(doc! {})), (Uuid::new(), Bson::Null)], "fresh")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
        assert!(store.list_collections().await.unwrap().iter().all(|name| name != "fresh"));
    }

    #[tokio::test]
    async fn failed_updates_and_deletes_write_nothing() {
        let (store, ids) = seeded().await;

        let err = store
            .update_documents(
                vec![(ids[0], Bson::Document(doc! { "rank": 99 })), (Uuid::new(), Bson::Document(doc! {}))],
                "items",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentNotFound(..)));

        let err = store
            .update_documents(vec![(ids[0], Bson::Document(doc! { "rank": 99 })), (ids[1], Bson::Int32(1))], "items")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));

        let documents = store.get_documents(vec![ids[0]], "items").await.unwrap();
        assert_eq!(field(&documents[0], "rank"), Some(&Bson::Int32(3)));

        let err = store
            .delete_documents(vec![ids[0], Uuid::new()], "items")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentNotFound(..)));
        assert_eq!(store.get_documents(ids.clone(), "items").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn object_id_mode_keeps_or_generates_object_ids() {
        let store = InMemoryStore::builder().with_id_kind(IdKind::ObjectId).build().await.unwrap();
        let given = ObjectId::new();
        let (first, second) = (Uuid::new(), Uuid::new());

        store
            .insert_documents(
                vec![
                    (first, Bson::Document(doc! { "_id": given, "n": 1 })),
                    (second, Bson::Document(doc! { "n": 2 })),
                ],
                "items",
            )
            .await
            .unwrap();
        assert_eq!(store.id_kind(), IdKind::ObjectId);

        let documents = store.get_documents(vec![first, second], "items").await.unwrap();
        assert_eq!(field(&documents[0], "_id"), Some(&Bson::ObjectId(given)));
        let generated = field(&documents[1], "_id").cloned().unwrap();
        assert!(matches!(generated, Bson::ObjectId(oid) if oid != given));

        store
            .update_documents(vec![(second, Bson::Document(doc! { "n": 3 }))], "items")
            .await
            .unwrap();
        let documents = store.get_documents(vec![second], "items").await.unwrap();
        assert_eq!(field(&documents[0], "_id"), Some(&generated));

        let err = store
            .insert_documents(vec![(Uuid::new(), Bson::Document(doc! { "_id": given }))], "items")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));

        let err = store
            .insert_documents(vec![(Uuid::new(), Bson::Document(doc! { "_id": "text" }))], "items")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }
}
