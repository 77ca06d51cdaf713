mod common;

use bson::{Bson, DateTime, doc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use common::{collect_pages, field, id_bytes, init_tracing, memory_store, new_id, seed};
use keypage::{
    DocumentStore, Filter, PageRequest, SortDirection,
    backend::IdKind,
    cursor::Cursor,
    document::Document,
    error::PaginationError,
    memory::InMemoryStore,
    query::Projection,
    tool::paginated_query,
};

const DAY_MS: i64 = 86_400_000;
const BASE_MS: i64 = 1_704_067_200_000;

fn day(n: i64) -> DateTime {
    DateTime::from_millis(BASE_MS + n * DAY_MS)
}

#[tokio::test]
async fn twenty_five_documents_in_pages_of_ten() {
    let store = memory_store();
    // Inserted out of order so the store's insertion order cannot leak through.
    let days = (0..25).map(|n| (n * 7) % 25).collect::<Vec<i64>>();
    seed(&store, "events", days.iter().map(|n| doc! { "date": day(*n), "n": *n }).collect()).await;

    let request = PageRequest::builder().sort("date", SortDirection::Asc).limit(10).build();
    let pages = collect_pages(&store, "events", request).await.unwrap();

    assert_eq!(pages.iter().map(|page| page.len()).collect::<Vec<_>>(), vec![10, 10, 5]);
    assert_eq!(pages.iter().map(|page| page.has_more()).collect::<Vec<_>>(), vec![true, true, false]);

    let seen = pages
        .iter()
        .flat_map(|page| page.items())
        .map(|document| field(document, "n").as_i64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(seen, (0..25).collect::<Vec<_>>());

    let boundary = pages[0].next_cursor().unwrap();
    assert_eq!(boundary.last_value, Bson::DateTime(day(9)));
}

#[tokio::test]
async fn exact_multiple_ends_without_an_empty_page() {
    let store = memory_store();
    seed(&store, "events", (0..20).map(|n| doc! { "n": n }).collect()).await;

    let request = PageRequest::builder().sort("n", SortDirection::Asc).limit(10).build();
    let pages = collect_pages(&store, "events", request).await.unwrap();

    assert_eq!(pages.len(), 2);
    assert!(!pages[1].has_more());
    assert!(pages[1].next_cursor().is_none());
}

#[tokio::test]
async fn ties_are_broken_by_id_across_page_boundaries() {
    let store = memory_store();
    let scores = [5, 1, 5, 5, 9, 5, 5, 1, 5, 5];
    seed(&store, "scores", scores.iter().map(|score| doc! { "score": *score }).collect()).await;

    let request = PageRequest::builder().sort("score", SortDirection::Asc).limit(3).build();
    let pages = collect_pages(&store, "scores", request).await.unwrap();
    let documents = pages.iter().flat_map(|page| page.items().to_vec()).collect::<Vec<_>>();

    assert_eq!(documents.len(), scores.len());

    let mut expected = documents.clone();
    expected.sort_by(|a, b| {
        let by_score = field(a, "score").as_i32().cmp(&field(b, "score").as_i32());
        by_score.then_with(|| id_bytes(a).cmp(&id_bytes(b)))
    });
    assert_eq!(documents, expected);

    // The first boundary falls inside the run of 5s.
    assert_eq!(pages[0].next_cursor().unwrap().last_value, Bson::Int32(5));
}

#[tokio::test]
async fn descending_sort_walks_backwards() {
    let store = memory_store();
    seed(&store, "events", (0..12).map(|n| doc! { "date": day(n % 4), "n": n }).collect()).await;

    let request = PageRequest::builder().sort("date", SortDirection::Desc).limit(5).build();
    let pages = collect_pages(&store, "events", request).await.unwrap();
    let documents = pages.iter().flat_map(|page| page.items().to_vec()).collect::<Vec<_>>();

    assert_eq!(documents.len(), 12);
    for pair in documents.windows(2) {
        let (a, b) = (field(&pair[0], "date"), field(&pair[1], "date"));
        assert!(a.as_datetime() >= b.as_datetime());
        if a == b {
            assert!(id_bytes(&pair[0]) > id_bytes(&pair[1]));
        }
    }
}

#[tokio::test]
async fn filter_applies_to_every_page() {
    let store = memory_store();
    seed(
        &store,
        "tickets",
        (0..30)
            .map(|n| {
                let status = if n % 3 == 0 { "closed" } else { "open" };
                doc! { "n": n, "status": status }
            })
            .collect(),
    )
    .await;

    let request = PageRequest::builder()
        .filter(Filter::eq("status", "open"))
        .sort("n", SortDirection::Asc)
        .limit(4)
        .build();
    let pages = collect_pages(&store, "tickets", request).await.unwrap();
    let numbers = pages
        .iter()
        .flat_map(|page| page.items())
        .map(|document| field(document, "n").as_i32().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(numbers, (0..30).filter(|n| n % 3 != 0).collect::<Vec<_>>());
}

#[tokio::test]
async fn empty_result_has_no_cursor() {
    let store = memory_store();
    seed(&store, "tickets", vec![doc! { "status": "open" }]).await;

    let request = PageRequest::builder()
        .filter(Filter::eq("status", "archived"))
        .sort("status", SortDirection::Asc)
        .build();
    let page = store.paginate("tickets", request).await.unwrap();

    assert!(page.is_empty());
    assert!(!page.has_more());
    assert!(page.next_cursor().is_none());
}

#[tokio::test]
async fn repeated_requests_return_identical_pages() {
    let store = memory_store();
    seed(&store, "events", (0..15).map(|n| doc! { "bucket": n % 3 }).collect()).await;

    let first = PageRequest::builder().sort("bucket", SortDirection::Asc).limit(4).build();
    assert_eq!(
        store.paginate("events", first.clone()).await.unwrap(),
        store.paginate("events", first.clone()).await.unwrap()
    );

    let page = store.paginate("events", first.clone()).await.unwrap();
    let resumed = first.next(&page).unwrap();
    assert_eq!(
        store.paginate("events", resumed.clone()).await.unwrap(),
        store.paginate("events", resumed).await.unwrap()
    );
}

#[tokio::test]
async fn inserts_before_the_cursor_are_not_repeated() {
    let store = memory_store();
    seed(&store, "events", (10..20).map(|n| doc! { "n": n }).collect()).await;

    let request = PageRequest::builder().sort("n", SortDirection::Asc).limit(5).build();
    let first = store.paginate("events", request.clone()).await.unwrap();

    seed(&store, "events", vec![doc! { "n": 1 }, doc! { "n": 12 }]).await;

    let second = store.paginate("events", request.next(&first).unwrap()).await.unwrap();
    let numbers = second
        .items()
        .iter()
        .map(|document| field(document, "n").as_i32().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(numbers, vec![15, 16, 17, 18, 19]);
}

#[tokio::test]
async fn projection_hides_sort_fields_but_cursor_still_resumes() {
    let store = memory_store();
    seed(
        &store,
        "posts",
        (0..6).map(|n| doc! { "title": format!("post {n}"), "date": day(n), "body": "..." }).collect(),
    )
    .await;

    let request = PageRequest::builder()
        .sort("date", SortDirection::Asc)
        .limit(4)
        .projection(Projection::new().include("title").exclude("_id"))
        .build();
    let pages = collect_pages(&store, "posts", request).await.unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].items()[0], Bson::Document(doc! { "title": "post 0" }));
    assert_eq!(pages[0].next_cursor().unwrap().last_value, Bson::DateTime(day(3)));
    assert_eq!(pages[1].items()[1], Bson::Document(doc! { "title": "post 5" }));
}

#[tokio::test]
async fn excluding_the_parent_of_a_nested_sort_field() {
    let store = memory_store();
    seed(
        &store,
        "posts",
        (0..5).map(|n| doc! { "title": format!("post {n}"), "meta": { "score": n, "tag": "t" } }).collect(),
    )
    .await;

    let request = PageRequest::builder()
        .sort("meta.score", SortDirection::Asc)
        .limit(2)
        .projection(Projection::new().exclude("meta"))
        .build();
    let pages = collect_pages(&store, "posts", request).await.unwrap();

    assert_eq!(pages.iter().map(|page| page.len()).collect::<Vec<_>>(), vec![2, 2, 1]);
    assert_eq!(pages[0].next_cursor().unwrap().last_value, Bson::Int32(1));
    let titles = pages
        .iter()
        .flat_map(|page| page.items())
        .map(|doc| {
            assert!(matches!(field(doc, "meta"), Bson::Null));
            field(doc, "title").as_str().unwrap_or_default().to_string()
        })
        .collect::<Vec<_>>();
    assert_eq!(titles, (0..5).map(|n| format!("post {n}")).collect::<Vec<_>>());
}

#[tokio::test]
async fn object_id_stores_page_by_object_id() {
    init_tracing();
    let store = DocumentStore::new(InMemoryStore::new().with_id_kind(IdKind::ObjectId));
    let entries = (0..25)
        .map(|n| (new_id(), Bson::Document(doc! { "n": n, "date": day(n % 3) })))
        .collect::<Vec<_>>();
    store.collection("events").insert(entries).await.unwrap();

    let request = PageRequest::builder().sort("date", SortDirection::Asc).limit(10).build();
    let pages = collect_pages(&store, "events", request).await.unwrap();

    assert_eq!(pages.iter().map(|page| page.len()).collect::<Vec<_>>(), vec![10, 10, 5]);
    for page in &pages[..2] {
        let last_id = &page.next_cursor().unwrap().last_id;
        assert_eq!(last_id.len(), 24);
        assert!(last_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    let keys = pages
        .iter()
        .flat_map(|page| page.items())
        .map(|doc| match (field(doc, "date"), field(doc, "_id")) {
            (Bson::DateTime(date), Bson::ObjectId(oid)) => (*date, *oid),
            other => panic!("unexpected sort values {other:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(keys.len(), 25);
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]), "pages are not in (date, _id) order");
}

#[tokio::test]
async fn oversized_and_zero_limits_are_rejected() {
    let store = memory_store();

    let err = store
        .paginate("events", PageRequest::builder().sort("n", SortDirection::Asc).limit(1001).build())
        .await
        .unwrap_err();
    assert!(matches!(err, PaginationError::LimitExceeded { requested: 1001, max: 1000 }));

    let err = store
        .paginate("events", PageRequest::builder().sort("n", SortDirection::Asc).limit(0).build())
        .await
        .unwrap_err();
    assert!(matches!(err, PaginationError::InvalidLimit));
}

#[tokio::test]
async fn mixed_sort_value_types_are_rejected() {
    let store = memory_store();
    seed(&store, "events", vec![doc! { "v": 1 }, doc! { "v": "one" }, doc! { "v": 2 }]).await;

    let err = store
        .paginate("events", PageRequest::builder().sort("v", SortDirection::Asc).limit(2).build())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "IncompatibleSortValue");
}

#[tokio::test]
async fn later_type_brackets_are_not_skipped_after_a_cursor() {
    let store = memory_store();
    seed(&store, "events", vec![doc! { "v": 1 }, doc! { "v": 2 }, doc! { "v": "a" }]).await;

    let request = PageRequest::builder().sort("v", SortDirection::Asc).limit(1).build();
    let first = store.paginate("events", request.clone()).await.unwrap();
    assert_eq!(first.items().iter().map(|doc| field(doc, "v").clone()).collect::<Vec<_>>(), vec![Bson::Int32(1)]);

    let err = store
        .paginate("events", request.next(&first).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "IncompatibleSortValue");
}

#[tokio::test]
async fn descending_pages_reach_documents_without_the_sort_field() {
    let store = memory_store();
    seed(
        &store,
        "events",
        vec![doc! { "v": 1 }, doc! { "v": 2 }, doc! { "v": 3 }, doc! { "other": true }],
    )
    .await;

    let request = PageRequest::builder().sort("v", SortDirection::Desc).limit(2).build();
    let pages = collect_pages(&store, "events", request).await.unwrap();

    let values = pages
        .iter()
        .flat_map(|page| page.items())
        .map(|doc| field(doc, "v").clone())
        .collect::<Vec<_>>();
    assert_eq!(values, vec![Bson::Int32(3), Bson::Int32(2), Bson::Int32(1), Bson::Null]);
    assert!(!pages.last().unwrap().has_more());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    id: bson::Uuid,
    title: String,
    date: DateTime,
}

impl Document for Event {
    fn id(&self) -> &bson::Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "typed_events"
    }
}

#[tokio::test]
async fn typed_collections_page_through_their_documents() {
    let store = memory_store();
    let events = store.typed_collection::<Event>();
    let inserted = (0..7)
        .map(|n| Event { id: new_id(), title: format!("event {n}"), date: day(6 - n) })
        .collect::<Vec<_>>();
    events.insert(inserted.clone()).await.unwrap();

    let request = PageRequest::builder().sort("date", SortDirection::Asc).limit(3).build();
    let mut titles = Vec::new();
    let mut next = Some(request);
    while let Some(request) = next {
        let page = events.paginate(request.clone()).await.unwrap();
        titles.extend(page.items().iter().map(|event| event.title.clone()));
        next = request.next(&page);
    }

    let mut expected = inserted;
    expected.sort_by_key(|event| event.date);
    assert_eq!(titles, expected.into_iter().map(|event| event.title).collect::<Vec<_>>());
}

#[tokio::test]
async fn json_dispatcher_follows_cursors_in_both_forms() {
    let store = memory_store();
    seed(&store, "events", (0..9).map(|n| doc! { "n": n, "date": day(n) }).collect()).await;
    let store = store.into_dyn();

    let first = paginated_query(
        &store,
        json!({ "collectionName": "events", "sortSpec": { "date": 1 }, "limit": 4 }),
    )
    .await;
    assert_eq!(first["pagination"]["hasMore"], json!(true));
    assert_eq!(first["pagination"]["count"], json!(4));

    let cursor = first["pagination"]["nextCursor"].clone();
    assert!(cursor["lastValue"]["$date"].is_object() || cursor["lastValue"]["$date"].is_string());

    let second = paginated_query(
        &store,
        json!({ "collectionName": "events", "sortSpec": { "date": 1 }, "limit": 4, "cursor": cursor }),
    )
    .await;
    assert_eq!(second["results"][0]["n"], json!(4));

    let token = Cursor::from_json(&second["pagination"]["nextCursor"]).unwrap().to_token();
    let third = paginated_query(
        &store,
        json!({ "collectionName": "events", "sortSpec": { "date": 1 }, "limit": 4, "cursor": token }),
    )
    .await;
    assert_eq!(third["pagination"], json!({ "hasMore": false, "count": 1, "nextCursor": null }));
    assert_eq!(third["results"][0]["n"], json!(8));
}

#[tokio::test]
async fn json_dispatcher_reports_tagged_errors() {
    let store = memory_store().into_dyn();

    let cases = [
        (json!({ "collectionName": "events", "sortSpec": {} }), "MissingSortSpec"),
        (json!({ "collectionName": "events", "sortSpec": { "n": 2 } }), "InvalidSortDirection"),
        (json!({ "collectionName": "events", "sortSpec": { "n": 1 }, "limit": 1001 }), "LimitExceeded"),
        (
            json!({
                "collectionName": "events",
                "sortSpec": { "n": 1 },
                "cursor": { "lastId": "not-an-id", "lastValue": 3 },
            }),
            "MalformedCursor",
        ),
        (json!({ "collectionName": "events", "sortSpec": { "n": 1 }, "cursor": "%%%" }), "MalformedCursor"),
        (json!({ "collectionName": "$bad", "sortSpec": { "n": 1 } }), "InvalidCollection"),
        (json!({ "collectionName": "events", "sortSpec": { "n": 1 }, "filter": [1] }), "InvalidArguments"),
    ];

    for (args, kind) in cases {
        let result = paginated_query(&store, args.clone()).await;
        assert_eq!(result["error"], json!(true), "{args}");
        assert_eq!(result["kind"], json!(kind), "{args}");
        assert!(result["message"].as_str().is_some_and(|message| !message.is_empty()));
    }
}
