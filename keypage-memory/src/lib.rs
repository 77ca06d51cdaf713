//! In-memory document storage backend for keypage.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **MongoDB-like semantics** - Dotted paths, cross-type sort order and type-bracketed range filters
//! - **Full query support** - Filtering, multi-key sorting, projection and limits
//!
//! # Quick Start
//!
//! ```ignore
//! use keypage::{DocumentStore, PageRequest, SortDirection, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     let events = store.typed_collection::<Event>();
//!
//!     events.insert(load_events()).await?;
//!
//!     let request = PageRequest::builder().sort("date", SortDirection::Asc).limit(10).build();
//!     let page = events.paginate(request).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as keypage_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
