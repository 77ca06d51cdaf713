//! Keyset pagination orchestrator.
//!
//! [`Paginator::paginate`] runs one request through
//! `Start -> PredicateBuilt -> Fetched -> Shaped -> Done`:
//!
//! 1. validate the collection name and resolve the sort plan;
//! 2. build the keyset predicate from the caller's filter and cursor;
//! 3. fetch `limit + 1` documents;
//! 4. drop the sentinel, derive the next cursor from the new last document
//!    and re-apply the caller's projection when the sort fields had to be
//!    fetched for the cursor.
//!
//! Any failure aborts the request. A page is never returned with
//! `has_more` set and no cursor, or the other way round.
//!
//! # Concurrency
//!
//! Requests share no mutable state; the only suspension point is the store
//! call. Dropping the returned future cancels that call.
//!
//! Consistency across pages is approximate-snapshot: a document inserted
//! or deleted between two page fetches may be skipped or, rarely, returned
//! twice. Within a single unchanged collection, following cursors until
//! `has_more` is false yields every matching document exactly once.
//!
//! # Sort values
//!
//! Cursor values must be orderable scalars (numbers, strings, dates,
//! booleans, object ids or UUIDs). Documents whose primary value falls in a
//! type bracket sorting after the cursor's, or that lack the field when
//! paging in descending order, stay reachable through the keyset predicate.
//! A page that would hand out a cursor while its fetched documents mix
//! classes, or hold a null or missing primary value, fails with
//! `IncompatibleSortValue`; a final page may mix them freely.

use bson::{Bson, Document};
use tracing::Instrument;

use crate::{
    backend::{DynStoreBackend, IdKind},
    config::PaginationConfig,
    cursor::Cursor,
    error::{PaginationError, PaginationResult},
    fetch::{FetchedPage, fetch_page},
    page::Page,
    predicate::{SortPlan, build_predicate, ensure_orderable},
    query::{Expr, Projection, SortSpec},
    value::get_path,
};

/// Longest collection name a store accepts.
const MAX_COLLECTION_NAME_LEN: usize = 255;

/// Arguments of one pagination request.
///
/// ```ignore
/// let request = PageRequest::builder()
///     .filter(Filter::eq("status", "open"))
///     .sort("date", SortDirection::Asc)
///     .limit(10)
///     .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    pub filter: Option<Expr>,
    pub sort: SortSpec,
    /// Defaults to [`PaginationConfig::default_limit`].
    pub limit: Option<usize>,
    /// `None` requests the first page.
    pub cursor: Option<Cursor>,
    /// `None` returns full documents.
    pub projection: Option<Projection>,
}

impl PageRequest {
    pub fn builder() -> PageRequestBuilder {
        PageRequestBuilder::default()
    }

    /// The request for the page following `page`, or `None` after the last page.
    pub fn next<T>(&self, page: &Page<T>) -> Option<PageRequest> {
        page.next_cursor().map(|cursor| PageRequest {
            cursor: Some(cursor.clone()),
            ..self.clone()
        })
    }
}

#[derive(Debug, Default)]
pub struct PageRequestBuilder {
    request: PageRequest,
}

impl PageRequestBuilder {
    pub fn filter(mut self, filter: Expr) -> Self {
        self.request.filter = Some(filter);
        self
    }

    /// Appends a sort key. The first key is the primary sort field.
    pub fn sort(mut self, field: impl Into<String>, direction: crate::query::SortDirection) -> Self {
        self.request.sort = self.request.sort.then(field, direction);
        self
    }

    pub fn sort_spec(mut self, sort: SortSpec) -> Self {
        self.request.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.request.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.request.cursor = cursor;
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.request.projection = Some(projection);
        self
    }

    pub fn build(self) -> PageRequest {
        self.request
    }
}

/// Runs keyset pagination requests against one backend.
#[derive(Debug)]
pub struct Paginator<'a, B: DynStoreBackend + ?Sized> {
    backend: &'a B,
    config: &'a PaginationConfig,
}

impl<'a, B: DynStoreBackend + ?Sized> Paginator<'a, B> {
    pub fn new(backend: &'a B, config: &'a PaginationConfig) -> Self {
        Self { backend, config }
    }

    /// Fetches one page of `collection`.
    pub async fn paginate(&self, collection: &str, request: PageRequest) -> PaginationResult<Page<Bson>> {
        let limit = request.limit.unwrap_or(self.config.default_limit);
        let span = tracing::debug_span!(
            "paginate",
            collection,
            limit,
            resumed = request.cursor.is_some(),
        );

        let result = self
            .run(collection, request, limit)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(page) => tracing::debug!(count = page.len(), has_more = page.has_more(), "page ready"),
            Err(err) => tracing::warn!(kind = err.kind(), error = %err, "pagination request failed"),
        });

        result
    }

    async fn run(&self, collection: &str, request: PageRequest, limit: usize) -> PaginationResult<Page<Bson>> {
        validate_collection_name(collection)?;
        let plan = SortPlan::resolve(&request.sort, &self.config.tiebreak_field)?;
        let id_kind = self.backend.id_kind();

        let predicate = build_predicate(request.filter, &plan, request.cursor.as_ref(), id_kind)?;

        let fetched = fetch_page(
            self.backend,
            collection,
            predicate,
            &plan,
            request.projection.as_ref(),
            limit,
            self.config.max_limit,
        )
        .await?;

        shape(fetched, &plan, limit, id_kind)
    }
}

/// Checks a collection name against the store's naming rules.
pub fn validate_collection_name(name: &str) -> PaginationResult<()> {
    let reason = if name.is_empty() {
        Some("collection name must not be empty")
    } else if name.len() > MAX_COLLECTION_NAME_LEN {
        Some("collection name is longer than 255 bytes")
    } else if name.contains('$') {
        Some("collection name must not contain '$'")
    } else if name.contains('\0') {
        Some("collection name must not contain NUL characters")
    } else if name.starts_with("system.") {
        Some("the system. prefix is reserved")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PaginationError::InvalidCollection {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn shape(fetched: FetchedPage, plan: &SortPlan, limit: usize, id_kind: IdKind) -> PaginationResult<Page<Bson>> {
    let FetchedPage { mut documents, reproject } = fetched;
    let has_more = documents.len() > limit;

    if has_more && !plan.is_tiebreak_only() {
        ensure_single_class(&documents, plan)?;
    }

    documents.truncate(limit);

    let next_cursor = match documents.last() {
        Some(last) if has_more => Some(cursor_for(last, plan, id_kind)?),
        _ => None,
    };

    if let Some(projection) = reproject {
        for document in documents.iter_mut().filter_map(Bson::as_document_mut) {
            *document = projection.apply(document);
        }
    }

    Ok(match next_cursor {
        Some(cursor) => Page::with_next(documents, cursor),
        None => Page::last(documents),
    })
}

fn as_document(document: &Bson) -> PaginationResult<&Document> {
    document
        .as_document()
        .ok_or_else(|| PaginationError::InvalidDocument("store returned a non-document value".to_string()))
}

fn cursor_for(last: &Bson, plan: &SortPlan, id_kind: IdKind) -> PaginationResult<Cursor> {
    let document = as_document(last)?;

    let id = get_path(document, &plan.tiebreak).ok_or_else(|| PaginationError::IncompatibleSortValue {
        field: plan.tiebreak.clone(),
        reason: "document has no tiebreak value".to_string(),
    })?;

    let value = if plan.is_tiebreak_only() {
        id.clone()
    } else {
        let value = get_path(document, &plan.primary).unwrap_or(&Bson::Null);
        ensure_orderable(&plan.primary, value)?;
        value.clone()
    };

    Cursor::encode(id_kind, id, value).ok_or_else(|| PaginationError::IncompatibleSortValue {
        field: plan.tiebreak.clone(),
        reason: format!("tiebreak value is not a {} identifier", id_kind.name()),
    })
}

fn ensure_single_class(documents: &[Bson], plan: &SortPlan) -> PaginationResult<()> {
    let mut expected = None;

    for document in documents {
        let value = get_path(as_document(document)?, &plan.primary).unwrap_or(&Bson::Null);
        let class = ensure_orderable(&plan.primary, value)?;

        match expected {
            None => expected = Some(class),
            Some(expected) if expected != class => {
                return Err(PaginationError::IncompatibleSortValue {
                    field: plan.primary.clone(),
                    reason: format!("page mixes {} and {} values", expected.name(), class.name()),
                });
            }
            Some(_) => {}
        }
    }

    Ok(())
}
