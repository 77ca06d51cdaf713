//! Convenient re-exports of commonly used types from keypage.
//!
//! ```ignore
//! use keypage::prelude::*;
//! ```

pub use keypage_core::{
    backend::{DynStoreBackend, IdKind, StoreBackend, StoreBackendBuilder},
    collection::{Collection, TypedCollection},
    config::PaginationConfig,
    cursor::Cursor,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult, PaginationError, PaginationResult},
    page::{Page, PageResult},
    paginate::{PageRequest, Paginator},
    query::{Expr, FieldOp, Filter, Projection, Query, QueryBuilder, QueryVisitor, Sort, SortDirection, SortSpec},
    store::{DocumentStore, DynDocumentStore},
};
