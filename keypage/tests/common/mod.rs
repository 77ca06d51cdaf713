#![allow(dead_code)]

use bson::{Bson, Document, Uuid};
use tracing_subscriber::EnvFilter;

use keypage::{
    DocumentStore, Page, PageRequest,
    error::PaginationResult,
    memory::InMemoryStore,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Time-ordered ids, so insertion order and tiebreak order agree.
pub fn new_id() -> Uuid {
    Uuid::from_bytes(uuid::Uuid::now_v7().into_bytes())
}

pub fn memory_store() -> DocumentStore<InMemoryStore> {
    init_tracing();
    DocumentStore::new(InMemoryStore::new())
}

pub async fn seed(store: &DocumentStore<InMemoryStore>, collection: &str, documents: Vec<Document>) -> Vec<Uuid> {
    let entries = documents
        .into_iter()
        .map(|document| (new_id(), Bson::Document(document)))
        .collect::<Vec<_>>();
    let ids = entries.iter().map(|(id, _)| *id).collect();

    store
        .collection(collection)
        .insert(entries)
        .await
        .expect("seeding the store");

    ids
}

/// Follows cursors from `request` until the last page.
pub async fn collect_pages(
    store: &DocumentStore<InMemoryStore>,
    collection: &str,
    request: PageRequest,
) -> PaginationResult<Vec<Page<Bson>>> {
    let mut pages = Vec::new();
    let mut request = Some(request);

    while let Some(current) = request {
        let page = store.paginate(collection, current.clone()).await?;
        request = current.next(&page);
        pages.push(page);

        assert!(pages.len() <= 1_000, "pagination did not terminate");
    }

    Ok(pages)
}

pub fn field<'a>(document: &'a Bson, path: &str) -> &'a Bson {
    document
        .as_document()
        .and_then(|document| keypage::value::get_path(document, path))
        .unwrap_or(&Bson::Null)
}

pub fn id_bytes(document: &Bson) -> Vec<u8> {
    match field(document, "_id") {
        Bson::Binary(binary) => binary.bytes.clone(),
        other => panic!("unexpected _id {other:?}"),
    }
}
