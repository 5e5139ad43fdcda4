use std::sync::Arc;

use futures::StreamExt;
use porter_collection::GatewayError;
use porter_http::generate;
use porter_query::{Cursor, Filter, Page, PaginatedFilter, Projection, Sort, SortClause};
use porter_testkit::MemoryCollection;
use porter_testkit::fixtures::{books_schema, caller, generate_books};
use serde_json::json;

fn books(n: usize) -> Arc<MemoryCollection> {
    Arc::new(MemoryCollection::new(books_schema()).with_rows(generate_books(n)))
}

fn projection() -> Projection {
    ["id", "title"].into_iter().collect()
}

fn export(
    collection: &Arc<MemoryCollection>,
    base: &PaginatedFilter,
) -> futures::stream::BoxStream<'static, Result<String, GatewayError>> {
    generate(
        caller(),
        projection(),
        "id,title".into(),
        base,
        &books_schema(),
        collection.clone(),
        1000,
    )
}

// ── Chunking ────────────────────────────────────────────────────

#[tokio::test]
async fn one_chunk_per_page_plus_header() {
    let collection = books(2500);
    let chunks: Vec<String> = export(&collection, &PaginatedFilter::default())
        .map(|c| c.unwrap())
        .collect()
        .await;

    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[0], "id,title\n");
    assert_eq!(chunks[1].lines().count(), 1000);
    assert_eq!(chunks[2].lines().count(), 1000);
    assert_eq!(chunks[3].lines().count(), 500);
    assert!(chunks[1].starts_with("1,Emma vol. 1\n"));
    assert!(chunks[3].ends_with("2500,Middlemarch vol. 2500\n"));

    assert_eq!(
        collection.pages(),
        vec![
            Some(Page::new(0, 1000)),
            Some(Page::new(1000, 1000)),
            Some(Page::new(2000, 1000)),
        ]
    );
}

#[tokio::test]
async fn exact_multiple_needs_a_terminating_fetch() {
    let collection = books(2000);
    let chunks: Vec<String> = export(&collection, &PaginatedFilter::default())
        .map(|c| c.unwrap())
        .collect()
        .await;

    assert_eq!(chunks.len(), 3);
    assert_eq!(collection.list_calls().len(), 3);
}

#[tokio::test]
async fn empty_collection_yields_only_the_header() {
    let collection = books(0);
    let chunks: Vec<String> = export(&collection, &PaginatedFilter::default())
        .map(|c| c.unwrap())
        .collect()
        .await;

    assert_eq!(chunks, vec!["id,title\n".to_string()]);
    assert_eq!(collection.list_calls().len(), 1);
}

// ── Pagination strategy ─────────────────────────────────────────

#[tokio::test]
async fn cursor_capable_collections_get_keyset_pages() {
    let collection = Arc::new(
        MemoryCollection::new(books_schema())
            .with_rows(generate_books(2500))
            .with_cursor_support(),
    );
    let chunks: Vec<String> = export(&collection, &PaginatedFilter::default())
        .map(|c| c.unwrap())
        .collect()
        .await;

    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[2].lines().next(), Some("1001,Solaris vol. 1001"));
    assert_eq!(
        collection.pages(),
        vec![
            Some(Page::new(0, 1000)),
            Some(Page::after(Cursor(vec![json!(1000)]), 1000)),
            Some(Page::after(Cursor(vec![json!(2000)]), 1000)),
        ]
    );
}

#[tokio::test]
async fn sort_is_forced_to_primary_key() {
    let collection = books(10);
    let base = PaginatedFilter::new(
        Filter::default(),
        Sort(vec![SortClause {
            field: "title".into(),
            ascending: false,
        }]),
        Some(Page::new(40, 5)),
    );
    let _ = export(&collection, &base).collect::<Vec<_>>().await;

    let calls = collection.list_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].sort, Sort::by_primary_key(&books_schema()));
    assert_eq!(calls[0].page, Some(Page::new(0, 1000)));
}

// ── Laziness and errors ─────────────────────────────────────────

#[tokio::test]
async fn nothing_is_fetched_before_the_consumer_pulls() {
    let collection = books(2500);
    let mut stream = export(&collection, &PaginatedFilter::default());

    assert_eq!(stream.next().await.unwrap().unwrap(), "id,title\n");
    assert!(collection.list_calls().is_empty());

    stream.next().await.unwrap().unwrap();
    assert_eq!(collection.list_calls().len(), 1);

    drop(stream);
    assert_eq!(collection.list_calls().len(), 1);
}

#[tokio::test]
async fn fetch_errors_abort_the_sequence() {
    let collection = Arc::new(
        MemoryCollection::new(books_schema())
            .with_rows(generate_books(2500))
            .failing_list_call(2),
    );
    let results: Vec<Result<String, GatewayError>> =
        export(&collection, &PaginatedFilter::default()).collect().await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(results[2], Err(GatewayError::Internal(_))));
    assert_eq!(collection.list_calls().len(), 2);
}
