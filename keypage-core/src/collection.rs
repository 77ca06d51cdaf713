//! Collection handles.
//!
//! A collection handle borrows a backend and the store's pagination settings
//! and scopes every operation to one collection name.
//!
//! - [`Collection`] - untyped collection of BSON documents
//! - [`TypedCollection`] - collection of a specific [`Document`] type
//!
//! Both work over a concrete backend or a `dyn DynStoreBackend`.
//!
//! # Example
//!
//! ```ignore
//! let events = store.typed_collection::<Event>();
//! events.insert(vec![event]).await?;
//!
//! let request = PageRequest::builder().sort("date", SortDirection::Asc).limit(10).build();
//! let page = events.paginate(request.clone()).await?;
//! if let Some(next) = request.next(&page) {
//!     let page = events.paginate(next).await?;
//! }
//! ```

use bson::{Bson, Uuid};
use std::marker::PhantomData;

use crate::{
    backend::DynStoreBackend,
    config::PaginationConfig,
    document::{Document, DocumentExt},
    error::{DocumentStoreResult, PaginationError, PaginationResult},
    page::Page,
    paginate::{PageRequest, Paginator},
    query::Query,
};

/// An untyped collection.
#[derive(Debug)]
pub struct Collection<'a, B: DynStoreBackend + ?Sized> {
    name: String,
    backend: &'a B,
    config: &'a PaginationConfig,
}

impl<'a, B: DynStoreBackend + ?Sized> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B, config: &'a PaginationConfig) -> Self {
        Self { name, backend, config }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts new documents, keyed by id.
    pub async fn insert(&self, documents: Vec<(Uuid, Bson)>) -> DocumentStoreResult<()> {
        self.backend
            .insert_documents(documents, &self.name)
            .await
    }

    /// Replaces existing documents.
    pub async fn update(&self, documents: Vec<(Uuid, Bson)>) -> DocumentStoreResult<()> {
        self.backend
            .update_documents(documents, &self.name)
            .await
    }

    pub async fn delete<U>(&self, ids: Vec<U>) -> DocumentStoreResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .delete_documents(ids.into_iter().map(Into::into).collect(), &self.name)
            .await
    }

    /// Retrieves documents by id. Ids that do not exist are omitted.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<Bson>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(ids.into_iter().map(Into::into).collect(), &self.name)
            .await
    }

    /// Runs a raw query without pagination.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        self.backend
            .query_documents(query, &self.name)
            .await
    }

    /// Fetches one page of documents.
    ///
    /// # Errors
    ///
    /// Returns a [`PaginationError`] describing the request problem or wrapping
    /// the store failure. No partial page is ever returned.
    pub async fn paginate(&self, request: PageRequest) -> PaginationResult<Page<Bson>> {
        Paginator::new(self.backend, self.config)
            .paginate(&self.name, request)
            .await
    }
}

/// A collection of `D` documents.
#[derive(Debug)]
pub struct TypedCollection<'a, B: DynStoreBackend + ?Sized, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: DynStoreBackend + ?Sized, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(backend: &'a B, config: &'a PaginationConfig) -> Self {
        Self {
            inner: Collection::new(D::collection_name().to_string(), backend, config),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// The untyped view of the same collection.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        self.inner.insert(to_entries(documents)?).await
    }

    pub async fn update(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        self.inner.update(to_entries(documents)?).await
    }

    pub async fn delete<U>(&self, ids: Vec<U>) -> DocumentStoreResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.inner.delete(ids).await
    }

    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<D>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.inner
            .get(ids)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.inner
            .query(query)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Fetches one page and deserializes its documents.
    ///
    /// A projection that drops fields `D` requires makes every item fail to
    /// deserialize; the page then fails with `InvalidDocument`.
    pub async fn paginate(&self, request: PageRequest) -> PaginationResult<Page<D>> {
        self.inner
            .paginate(request)
            .await?
            .try_map(|item| D::from_bson(item).map_err(|err| PaginationError::InvalidDocument(err.to_string())))
    }
}

fn to_entries<D: Document>(documents: Vec<D>) -> DocumentStoreResult<Vec<(Uuid, Bson)>> {
    documents
        .into_iter()
        .map(|document| Ok((*document.id(), document.to_bson()?)))
        .collect()
}
