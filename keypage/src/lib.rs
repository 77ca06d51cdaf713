//! Keyset (cursor-based) pagination over document stores.
//!
//! This crate is the primary entry point. It re-exports the pagination core
//! from `keypage-core`, the storage backends, and adds configuration, a
//! MongoDB-style JSON filter parser and a JSON dispatcher for callers that
//! speak JSON.
//!
//! Pages are ordered by a caller supplied sort field plus a unique tiebreak
//! field (`_id` by default). Each page carries a cursor naming the last
//! document it returned; the next request resumes strictly after it, so
//! iteration stays stable when documents are inserted elsewhere in the
//! collection.
//!
//! # Quick Start
//!
//! ```ignore
//! use keypage::{prelude::*, memory::InMemoryStore};
//! use bson::{doc, Bson, Uuid};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     let events = store.collection("events");
//!
//!     events
//!         .insert((1..=25).map(|n| (Uuid::new(), Bson::Document(doc! { "n": n }))).collect())
//!         .await?;
//!
//!     let mut request = PageRequest::builder()
//!         .sort("n", SortDirection::Asc)
//!         .limit(10)
//!         .build();
//!
//!     loop {
//!         let page = events.paginate(request.clone()).await?;
//!         println!("{} documents", page.len());
//!
//!         match request.next(&page) {
//!             Some(next) => request = next,
//!             None => break,
//!         }
//!     }
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # JSON callers
//!
//! ```ignore
//! let store = keypage::connect(&keypage::Config::from_env()?).await?;
//! let result = keypage::tool::paginated_query(&store, serde_json::json!({
//!     "collectionName": "events",
//!     "filter": { "status": "open" },
//!     "sortSpec": { "date": -1 },
//!     "limit": 10,
//! })).await;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

pub mod config;
pub mod filter;
pub mod prelude;
pub mod tool;

pub use keypage_core::{
    backend, collection, cursor, document, error, fetch, page, paginate, predicate, query, store, value,
};

pub use keypage_core::{
    page::{Page, PageResult},
    paginate::PageRequest,
    query::{Filter, SortDirection, SortSpec},
    store::{DocumentStore, DynDocumentStore},
};

pub use config::{BackendConfig, Config, connect};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use keypage_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use keypage_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
