//! Page types returned by keyset pagination.
//!
//! A [`Page`] is created per request and handed to the caller; nothing about
//! it is retained. Its constructors keep the metadata consistent with the
//! content: a page either has more results *and* a next cursor, or neither.
//!
//! [`PageResult`] is the caller-facing wire shape:
//!
//! ```json
//! {
//!   "results": [ ... ],
//!   "pagination": {
//!     "hasMore": true,
//!     "count": 10,
//!     "nextCursor": { "lastId": "...", "lastValue": { "$date": "..." } }
//!   }
//! }
//! ```

use bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cursor::Cursor,
    value::{JsonMode, to_json, truncate_strings},
};

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    items: Vec<T>,
    next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// A page with further results after it.
    pub fn with_next(items: Vec<T>, next_cursor: Cursor) -> Self {
        Self { items, next_cursor: Some(next_cursor) }
    }

    /// The final page of a result set.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next_cursor: None }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_parts(self) -> (Vec<T>, Option<Cursor>) {
        (self.items, self.next_cursor)
    }

    /// Converts every item, failing the whole page if any conversion fails.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self
                .items
                .into_iter()
                .map(f)
                .collect::<Result<Vec<_>, _>>()?,
            next_cursor: self.next_cursor,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::last(Vec::new())
    }
}

/// Pagination metadata of a [`PageResult`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub has_more: bool,
    /// Number of documents in this page.
    pub count: usize,
    pub next_cursor: Option<Cursor>,
}

/// Caller-facing encoding of a page of documents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageResult {
    pub results: Vec<Value>,
    pub pagination: PaginationInfo,
}

impl PageResult {
    /// Encodes a page as relaxed extended JSON, optionally truncating long strings.
    pub fn from_page(page: Page<Bson>, max_string_length: Option<usize>) -> Self {
        let (items, next_cursor) = page.into_parts();
        let count = items.len();

        let results = items
            .into_iter()
            .map(|mut item| {
                if let Some(max) = max_string_length {
                    truncate_strings(&mut item, max);
                }
                to_json(&item, JsonMode::Relaxed)
            })
            .collect();

        Self {
            results,
            pagination: PaginationInfo {
                has_more: next_cursor.is_some(),
                count,
                next_cursor,
            },
        }
    }
}
