//! JSON dispatcher for the `paginatedQuery` operation.
//!
//! Callers that speak JSON (RPC handlers, agent tools) send one argument
//! object and receive either a [`PageResult`] or a tagged error:
//!
//! ```json
//! { "collectionName": "events", "filter": { "status": "open" },
//!   "sortSpec": { "date": 1 }, "limit": 10, "cursor": null }
//! ```
//!
//! ```json
//! { "error": true, "kind": "MalformedCursor", "message": "..." }
//! ```

use serde::Deserialize;
use serde_json::{Value, json};

use keypage_core::{
    cursor::Cursor,
    error::{PaginationError, PaginationResult},
    page::PageResult,
    paginate::PageRequest,
    query::{Projection, SortSpec},
    store::DynDocumentStore,
};

use crate::filter::parse_filter;

/// Arguments of a `paginatedQuery` call.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedQueryArgs {
    pub collection_name: String,
    #[serde(default)]
    pub filter: Value,
    #[serde(default, alias = "sort")]
    pub sort_spec: Value,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<Value>,
    #[serde(default)]
    pub projection: Option<Value>,
}

impl PaginatedQueryArgs {
    pub fn from_json(raw: Value) -> PaginationResult<Self> {
        serde_json::from_value(raw).map_err(|e| PaginationError::InvalidArguments(e.to_string()))
    }

    /// Decodes the JSON fields into a typed request.
    pub fn into_request(self) -> PaginationResult<(String, PageRequest)> {
        let limit = match self.limit {
            Some(limit) if limit <= 0 => return Err(PaginationError::InvalidLimit),
            Some(limit) => Some(usize::try_from(limit).map_err(|_| PaginationError::InvalidLimit)?),
            None => None,
        };

        let cursor = match self.cursor {
            None | Some(Value::Null) => None,
            Some(raw) => Some(Cursor::from_json(&raw)?),
        };

        let projection = match self.projection {
            None | Some(Value::Null) => None,
            Some(raw) => Some(Projection::from_json(&raw).map_err(PaginationError::InvalidArguments)?),
        };

        let request = PageRequest {
            filter: parse_filter(&self.filter)?,
            sort: SortSpec::from_json(&self.sort_spec)?,
            limit,
            cursor,
            projection,
        };

        Ok((self.collection_name, request))
    }
}

/// Runs `paginatedQuery`, returning the typed result or error.
pub async fn try_paginated_query(store: &DynDocumentStore, args: Value) -> PaginationResult<PageResult> {
    let (collection, request) = PaginatedQueryArgs::from_json(args)?.into_request()?;
    let page = store.paginate(&collection, request).await?;

    Ok(PageResult::from_page(page, store.pagination_config().max_string_length))
}

/// Runs `paginatedQuery` and encodes the outcome as JSON. Never fails;
/// errors become `{ "error": true, "kind": ..., "message": ... }`.
pub async fn paginated_query(store: &DynDocumentStore, args: Value) -> Value {
    match try_paginated_query(store, args).await {
        Ok(result) => serde_json::to_value(result).unwrap_or_else(|e| {
            error_result(&PaginationError::InvalidDocument(format!("unable to encode page: {e}")))
        }),
        Err(err) => error_result(&err),
    }
}

pub fn error_result(err: &PaginationError) -> Value {
    json!({
        "error": true,
        "kind": err.kind(),
        "message": err.to_string(),
    })
}
