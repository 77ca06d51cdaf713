//! Bounded page fetches.
//!
//! The fetcher asks the store for one document more than the page size. The
//! extra document is a sentinel: its presence is how the orchestrator learns
//! that another page exists, and it is never returned to the caller. This
//! costs no extra round trip and cannot race a separate `count()`.

use bson::Bson;

use crate::{
    backend::DynStoreBackend,
    error::{PaginationError, PaginationResult},
    predicate::SortPlan,
    query::{Expr, Projection, Query},
};

/// Documents returned by one fetch, sentinel included.
#[derive(Debug)]
pub struct FetchedPage {
    pub documents: Vec<Bson>,
    /// The caller's projection, set when it had to be widened to return the
    /// sort fields. It is applied again once the cursor is derived.
    pub reproject: Option<Projection>,
}

/// Checks that `limit` is within `1..=max_limit`.
pub fn check_limit(limit: usize, max_limit: usize) -> PaginationResult<()> {
    if limit == 0 {
        return Err(PaginationError::InvalidLimit);
    }
    if limit > max_limit {
        return Err(PaginationError::LimitExceeded { requested: limit, max: max_limit });
    }

    Ok(())
}

/// Fetches up to `limit + 1` documents in sort-plan order.
pub async fn fetch_page<B>(
    backend: &B,
    collection: &str,
    predicate: Option<Expr>,
    plan: &SortPlan,
    projection: Option<&Projection>,
    limit: usize,
    max_limit: usize,
) -> PaginationResult<FetchedPage>
where
    B: DynStoreBackend + ?Sized,
{
    check_limit(limit, max_limit)?;
    let requested = limit
        .checked_add(1)
        .ok_or(PaginationError::LimitExceeded { requested: limit, max: max_limit })?;

    let (projection, reproject) = match projection {
        Some(projection) if !projection.is_empty() => {
            let widened = projection.require(&[plan.primary.as_str(), plan.tiebreak.as_str()]);
            let reproject = (widened != *projection).then(|| projection.clone());
            (Some(widened), reproject)
        }
        _ => (None, None),
    };

    let query = plan
        .sorts()
        .into_iter()
        .fold(Query::builder(), |builder, sort| builder.sort(sort.field, sort.direction))
        .maybe_filter(predicate)
        .projection(projection)
        .limit(requested)
        .build();

    let documents = backend
        .query_documents(query, collection)
        .await
        .map_err(PaginationError::StoreUnavailable)?;

    tracing::debug!(collection, requested, fetched = documents.len(), "fetched page");

    Ok(FetchedPage { documents, reproject })
}
