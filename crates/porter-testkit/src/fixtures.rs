use porter_collection::Caller;
use porter_query::{
    ActionSchema, ActionScope, CollectionSchema, ColumnSchema, ColumnType, ColumnValidation,
    Datasource, Operator, Record, RelationSchema, RelationType,
};
use serde_json::{Value, json};

pub const BOOKS: &str = "books";
pub const AUTHORS: &str = "authors";
pub const SHELF_SLOTS: &str = "shelf_slots";

const COMPARABLE: [Operator; 9] = [
    Operator::Equal,
    Operator::NotEqual,
    Operator::In,
    Operator::NotIn,
    Operator::LessThan,
    Operator::GreaterThan,
    Operator::Present,
    Operator::Blank,
    Operator::Missing,
];

const TEXT: [Operator; 7] = [
    Operator::Equal,
    Operator::NotEqual,
    Operator::In,
    Operator::NotIn,
    Operator::Contains,
    Operator::StartsWith,
    Operator::Present,
];

pub fn books_schema() -> CollectionSchema {
    CollectionSchema::new(BOOKS)
        .column(
            ColumnSchema::new("id", ColumnType::Number)
                .primary_key()
                .sortable()
                .operators(COMPARABLE),
        )
        .column(ColumnSchema::new("title", ColumnType::String).sortable().operators(TEXT))
        .column(ColumnSchema::new("price", ColumnType::Number).sortable().operators(COMPARABLE))
        .column(
            ColumnSchema::new("in_stock", ColumnType::Boolean)
                .operators([Operator::Equal, Operator::In]),
        )
        .column(ColumnSchema::new("author_id", ColumnType::Number).operators(COMPARABLE))
        .column(ColumnSchema::new("isbn", ColumnType::String).read_only())
        .relation(RelationSchema {
            name: "author".into(),
            relation_type: RelationType::ManyToOne,
            foreign_collection: AUTHORS.into(),
            foreign_key: "author_id".into(),
            foreign_key_target: "id".into(),
        })
        .searchable()
        .segment("bestsellers")
        .action(ActionSchema::new("Restock", ActionScope::Bulk))
        .action(ActionSchema::new("Feature", ActionScope::Single))
        .action(ActionSchema::new("Download catalog", ActionScope::Global))
}

pub fn authors_schema() -> CollectionSchema {
    CollectionSchema::new(AUTHORS)
        .column(
            ColumnSchema::new("id", ColumnType::Number)
                .primary_key()
                .sortable()
                .operators(COMPARABLE),
        )
        .column(ColumnSchema::new("name", ColumnType::String).sortable().operators(TEXT))
        .relation(RelationSchema {
            name: "books".into(),
            relation_type: RelationType::OneToMany,
            foreign_collection: BOOKS.into(),
            foreign_key: "author_id".into(),
            foreign_key_target: "id".into(),
        })
}

/// A collection keyed by `(shelf, slot)`.
pub fn shelf_slots_schema() -> CollectionSchema {
    CollectionSchema::new(SHELF_SLOTS)
        .column(
            ColumnSchema::new("shelf", ColumnType::String)
                .primary_key()
                .sortable()
                .operators(TEXT)
                .rule(ColumnValidation::Present),
        )
        .column(
            ColumnSchema::new("slot", ColumnType::Number)
                .primary_key()
                .sortable()
                .operators(COMPARABLE)
                .rule(ColumnValidation::GreaterThan(0.0)),
        )
        .column(ColumnSchema::new("book_id", ColumnType::Number).operators(COMPARABLE))
}

pub fn bookstore() -> Datasource {
    Datasource::new()
        .with_collection(books_schema())
        .with_collection(authors_schema())
        .with_collection(shelf_slots_schema())
}

pub fn caller() -> Caller {
    Caller::new("7", "ada@example.com", "Europe/Paris")
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record fixture must be an object, got {other}"),
    }
}

/// `n` books with ids `1..=n`, spread over three authors.
pub fn generate_books(n: usize) -> Vec<Record> {
    let titles = ["Dune", "Emma", "Ulysses", "Beloved", "Middlemarch", "Solaris"];
    (1..=n)
        .map(|i| {
            record(json!({
                "id": i,
                "title": format!("{} vol. {i}", titles[i % titles.len()]),
                "price": (i % 40) as f64 + 0.5,
                "in_stock": i % 3 != 0,
                "author_id": i % 3 + 1,
                "isbn": format!("978-{i:010}"),
            }))
        })
        .collect()
}

pub fn generate_authors() -> Vec<Record> {
    ["Le Guin", "Morrison", "Eliot"]
        .iter()
        .enumerate()
        .map(|(i, name)| record(json!({ "id": i + 1, "name": name })))
        .collect()
}
