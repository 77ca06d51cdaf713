//! Keyset (cursor-based) pagination over JSON document stores.
//!
//! This crate is the core of the keypage project and provides:
//!
//! - **Value model** ([`value`]) - BSON values, dotted paths and extended JSON
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Query API** ([`query`]) - Filter expressions, sort specs and projections
//! - **Cursors** ([`cursor`]) - Opaque resume positions handed to callers
//! - **Keyset predicates** ([`predicate`]) - Filters that resume strictly after a cursor
//! - **Page fetching** ([`fetch`]) - Bounded, overfetching store reads
//! - **Pagination** ([`paginate`]) - The request orchestrator
//! - **Pages** ([`page`]) - Page values and their caller-facing encoding
//! - **Collections and stores** ([`collection`], [`store`]) - Handles tying it all together
//! - **Configuration** ([`config`]) - Page size bounds and the tiebreak field
//! - **Error handling** ([`error`]) - Store and pagination error types
//!
//! # Example
//!
//! ```ignore
//! use keypage::prelude::*;
//!
//! let store = DocumentStore::new(backend);
//! let request = PageRequest::builder()
//!     .filter(Filter::eq("status", "open"))
//!     .sort("date", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//!
//! let mut page = store.paginate("tickets", request.clone()).await?;
//! while let Some(next) = request.next(&page) {
//!     page = store.paginate("tickets", next).await?;
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as keypage_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod document;
pub mod error;
pub mod fetch;
pub mod page;
pub mod paginate;
pub mod predicate;
pub mod query;
pub mod store;
pub mod value;
