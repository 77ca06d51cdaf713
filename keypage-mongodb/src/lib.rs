//! MongoDB backend implementation for keypage.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters, multi-key sorts, projections and limits are pushed down to the
//! server, so keyset pagination costs one bounded `find` per page.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! keypage = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! Sorting on the primary field plus `_id` is only efficient with a compound
//! index on `{ <field>: 1, _id: 1 }` (or the descending equivalent).
//!
//! # Example
//!
//! ```ignore
//! use keypage::{backend::{IdKind, StoreBackendBuilder}, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .with_id_kind(IdKind::ObjectId)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as keypage_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
