#![allow(dead_code)]

use std::sync::Arc;

use porter_http::{CallerIdentity, GatewayConfig, GatewayHttp, GatewayState, IanaTimezones};
use porter_testkit::fixtures::{
    authors_schema, books_schema, bookstore, generate_authors, generate_books, shelf_slots_schema,
};
use porter_testkit::{MemoryCollection, MemoryRegistry, StaticAuthorizer, StaticScope};

pub fn registry(books: usize) -> MemoryRegistry {
    MemoryRegistry::new(bookstore())
        .with(MemoryCollection::new(books_schema()).with_rows(generate_books(books)))
        .with(MemoryCollection::new(authors_schema()).with_rows(generate_authors()))
        .with(MemoryCollection::new(shelf_slots_schema()))
}

pub fn gateway(
    registry: Arc<MemoryRegistry>,
    scopes: StaticScope,
    authorizer: StaticAuthorizer,
) -> GatewayHttp {
    GatewayHttp::new(GatewayState {
        registry,
        scopes: Arc::new(scopes),
        authorizer: Arc::new(authorizer),
        timezones: Arc::new(IanaTimezones),
        config: Arc::new(GatewayConfig::default()),
    })
}

pub fn identity() -> CallerIdentity {
    CallerIdentity::new("7", "ada@example.com")
}

pub fn json_body(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}
