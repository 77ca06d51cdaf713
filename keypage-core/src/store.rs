//! Document store handles.
//!
//! - [`DocumentStore`] - store bound to a concrete backend type
//! - [`DynDocumentStore`] - store over a boxed backend chosen at runtime
//!
//! Both own their backend together with the [`PaginationConfig`] every
//! paginated request of the store is checked against.
//!
//! # Example
//!
//! ```ignore
//! use keypage::{DocumentStore, PageRequest, SortDirection};
//!
//! let store = DocumentStore::new(backend);
//! let request = PageRequest::builder().sort("date", SortDirection::Desc).build();
//! let page = store.paginate("events", request).await?;
//! ```

use bson::Bson;

use crate::{
    backend::{DynStoreBackend, IdKind, StoreBackend},
    collection::{Collection, TypedCollection},
    config::PaginationConfig,
    document::Document,
    error::{DocumentStoreResult, PaginationResult},
    page::Page,
    paginate::{PageRequest, Paginator},
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend + 'static> {
    backend: B,
    config: PaginationConfig,
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Creates a store with the default pagination settings.
    pub fn new(backend: B) -> Self {
        Self::with_pagination_config(backend, PaginationConfig::default())
    }

    pub fn with_pagination_config(backend: B, config: PaginationConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pagination_config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn id_kind(&self) -> IdKind {
        StoreBackend::id_kind(&self.backend)
    }

    /// The collection named by `D::collection_name()`.
    pub fn typed_collection<D: Document>(&self) -> TypedCollection<'_, B, D> {
        TypedCollection::new(&self.backend, &self.config)
    }

    pub fn collection(&self, name: &str) -> Collection<'_, B> {
        Collection::new(name.to_string(), &self.backend, &self.config)
    }

    /// Fetches one page of `collection`.
    pub async fn paginate(&self, collection: &str, request: PageRequest) -> PaginationResult<Page<Bson>> {
        Paginator::new(&self.backend, &self.config)
            .paginate(collection, request)
            .await
    }

    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(&self.backend, name).await
    }

    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(&self.backend, name).await
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(&self.backend).await
    }

    /// Erases the backend type.
    pub fn into_dyn(self) -> DynDocumentStore {
        DynDocumentStore::with_pagination_config(Box::new(self.backend), self.config)
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

/// A document store over a backend selected at runtime.
#[derive(Debug)]
pub struct DynDocumentStore {
    backend: Box<dyn DynStoreBackend>,
    config: PaginationConfig,
}

impl DynDocumentStore {
    pub fn new(backend: Box<dyn DynStoreBackend>) -> Self {
        Self::with_pagination_config(backend, PaginationConfig::default())
    }

    pub fn with_pagination_config(backend: Box<dyn DynStoreBackend>, config: PaginationConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &dyn DynStoreBackend {
        &*self.backend
    }

    /// The backend as its concrete type, if it is a `B`.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }

    pub fn pagination_config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn id_kind(&self) -> IdKind {
        self.backend.id_kind()
    }

    pub fn typed_collection<D: Document>(&self) -> TypedCollection<'_, dyn DynStoreBackend, D> {
        TypedCollection::new(&*self.backend, &self.config)
    }

    pub fn collection(&self, name: &str) -> Collection<'_, dyn DynStoreBackend> {
        Collection::new(name.to_string(), &*self.backend, &self.config)
    }

    /// Fetches one page of `collection`.
    pub async fn paginate(&self, collection: &str, request: PageRequest) -> PaginationResult<Page<Bson>> {
        Paginator::new(&*self.backend, &self.config)
            .paginate(collection, request)
            .await
    }

    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.create_collection(name).await
    }

    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown_boxed().await
    }
}
