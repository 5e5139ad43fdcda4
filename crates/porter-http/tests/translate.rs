use porter_collection::GatewayError;
use porter_http::{GatewayConfig, IanaTimezones, NoTimezoneSupport, RequestQueryTranslator, RequestSnapshot};
use porter_query::{ConditionTree, Operator, Page, Projection, Sort, SortClause};
use porter_testkit::fixtures::{BOOKS, bookstore};
use serde_json::json;

fn with_translator<T>(f: impl FnOnce(&RequestQueryTranslator<'_>) -> T) -> T {
    let ds = bookstore();
    let config = GatewayConfig::default();
    let translator = RequestQueryTranslator::new(&ds, ds.collection(BOOKS).unwrap(), &config, &IanaTimezones);
    f(&translator)
}

fn message(err: GatewayError) -> String {
    match err {
        GatewayError::Validation(msg) => msg,
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ── Pagination ──────────────────────────────────────────────────

#[test]
fn pagination_converts_page_number_to_skip() {
    let request = RequestSnapshot::new()
        .with_query("page[size]", "10")
        .with_query("page[number]", "3");
    let page = with_translator(|t| t.parse_pagination(&request)).unwrap();
    assert_eq!(page, Page::new(20, 10));
}

#[test]
fn pagination_defaults() {
    let page = with_translator(|t| t.parse_pagination(&RequestSnapshot::new())).unwrap();
    assert_eq!(page, Page::new(0, 15));
}

#[test]
fn pagination_error_mentions_both_raw_values() {
    let request = RequestSnapshot::new().with_body(json!({ "page[size]": -5, "page[number]": "NaN" }));
    let err = message(with_translator(|t| t.parse_pagination(&request)).unwrap_err());
    assert!(err.contains("-5"), "{err}");
    assert!(err.contains("NaN"), "{err}");
}

#[test]
fn pagination_zero_is_rejected() {
    let request = RequestSnapshot::new().with_query("page[number]", "0");
    assert!(with_translator(|t| t.parse_pagination(&request)).is_err());
}

// ── Condition tree ──────────────────────────────────────────────

#[test]
fn filters_are_parsed_and_validated() {
    let request = RequestSnapshot::new().with_query(
        "filters",
        r#"{"aggregator":"and","conditions":[{"field":"price","operator":"less_than","value":10}]}"#,
    );
    let tree = with_translator(|t| t.parse_condition_tree(&request)).unwrap();
    assert_eq!(
        tree,
        Some(ConditionTree::leaf("price", Operator::LessThan, json!(10)))
    );
}

#[test]
fn in_string_on_numeric_column_drops_garbage() {
    let request = RequestSnapshot::new()
        .with_query("filters", r#"{"field":"price","operator":"in","value":"1, 2, 3 , invalid"}"#);
    let tree = with_translator(|t| t.parse_condition_tree(&request)).unwrap();
    assert_eq!(
        tree,
        Some(ConditionTree::leaf("price", Operator::In, json!([1, 2, 3])))
    );
}

#[test]
fn malformed_filters_do_not_leak_parser_detail() {
    let request = RequestSnapshot::new().with_query("filters", "{oops");
    let err = message(with_translator(|t| t.parse_condition_tree(&request)).unwrap_err());
    assert_eq!(err, "Invalid filters: not a valid JSON document");
}

#[test]
fn unsupported_operator_is_rejected() {
    let request = RequestSnapshot::new()
        .with_query("filters", r#"{"field":"in_stock","operator":"greater_than","value":true}"#);
    let err = message(with_translator(|t| t.parse_condition_tree(&request)).unwrap_err());
    assert!(err.starts_with("Invalid filters:"), "{err}");
    assert!(err.contains("in_stock"), "{err}");
}

#[test]
fn envelope_filters_take_precedence() {
    let request = RequestSnapshot::new()
        .with_query("filters", r#"{"field":"id","operator":"equal","value":1}"#)
        .with_body(json!({
            "data": { "attributes": { "all_records_subset_query": {
                "filters": "{\"field\":\"id\",\"operator\":\"equal\",\"value\":2}"
            } } }
        }));
    let tree = with_translator(|t| t.parse_condition_tree(&request)).unwrap();
    assert_eq!(tree, Some(ConditionTree::leaf("id", Operator::Equal, json!(2))));
}

// ── Projection ──────────────────────────────────────────────────

#[test]
fn projection_defaults_to_every_column() {
    let projection = with_translator(|t| t.parse_projection(&RequestSnapshot::new())).unwrap();
    assert_eq!(
        projection.paths(),
        ["id", "title", "price", "in_stock", "author_id", "isbn"]
    );
}

#[test]
fn projection_expands_relations() {
    let request = RequestSnapshot::new()
        .with_query("fields[books]", "title,author")
        .with_query("fields[author]", "name");
    let projection = with_translator(|t| t.parse_projection_with_pks(&request)).unwrap();
    let expected: Projection = ["title", "author:name", "id"].into_iter().collect();
    assert_eq!(projection, expected);
}

#[test]
fn relation_without_subfields_uses_foreign_keys() {
    let request = RequestSnapshot::new().with_query("fields[books]", "author");
    let projection = with_translator(|t| t.parse_projection(&request)).unwrap();
    assert_eq!(projection.paths(), ["author:id"]);
}

#[test]
fn invalid_projection_is_generic() {
    let request = RequestSnapshot::new()
        .with_query("fields[books]", "title,author")
        .with_query("fields[author]", "password");
    let err = message(with_translator(|t| t.parse_projection(&request)).unwrap_err());
    assert_eq!(err, "Invalid projection");
}

// ── Sort, search, segment ───────────────────────────────────────

#[test]
fn sort_defaults_to_primary_key() {
    let sort = with_translator(|t| t.parse_sort(&RequestSnapshot::new())).unwrap();
    assert_eq!(
        sort,
        Sort(vec![SortClause {
            field: "id".into(),
            ascending: true
        }])
    );
}

#[test]
fn sort_descending_and_relation_paths() {
    let request = RequestSnapshot::new().with_query("sort", "-author.name");
    let sort = with_translator(|t| t.parse_sort(&request)).unwrap();
    assert_eq!(
        sort,
        Sort(vec![SortClause {
            field: "author:name".into(),
            ascending: false
        }])
    );
}

#[test]
fn unsortable_field_names_raw_input() {
    let request = RequestSnapshot::new().with_query("sort", "-isbn");
    let err = message(with_translator(|t| t.parse_sort(&request)).unwrap_err());
    assert_eq!(err, "Invalid sort: -isbn");
}

#[test]
fn search_and_segment() {
    let request = RequestSnapshot::new()
        .with_query("search", "dune")
        .with_query("searchExtended", "1")
        .with_query("segment", "bestsellers");
    with_translator(|t| {
        assert_eq!(t.parse_search(&request).unwrap().as_deref(), Some("dune"));
        assert!(t.parse_search_extended(&request));
        assert_eq!(t.parse_segment(&request).unwrap().as_deref(), Some("bestsellers"));
    });

    let unknown = RequestSnapshot::new().with_query("segment", "classics");
    let err = message(with_translator(|t| t.parse_segment(&unknown)).unwrap_err());
    assert_eq!(err, "Invalid segment: \"classics\"");
}

#[test]
fn search_requires_searchable_collection() {
    let ds = bookstore();
    let config = GatewayConfig::default();
    let translator =
        RequestQueryTranslator::new(&ds, ds.collection("authors").unwrap(), &config, &IanaTimezones);
    let request = RequestSnapshot::new().with_query("search", "eliot");
    let err = message(translator.parse_search(&request).unwrap_err());
    assert_eq!(err, "Collection 'authors' is not searchable");
}

// ── Timezone ────────────────────────────────────────────────────

#[test]
fn timezone_is_required_and_validated() {
    with_translator(|t| {
        let ok = RequestSnapshot::new().with_query("timezone", "America/New_York");
        assert_eq!(t.parse_timezone(&ok).unwrap(), "America/New_York");

        let missing = message(t.parse_timezone(&RequestSnapshot::new()).unwrap_err());
        assert_eq!(missing, "Missing timezone");

        let bad = RequestSnapshot::new().with_query("timezone", "Mars/Olympus");
        let err = message(t.parse_timezone(&bad).unwrap_err());
        assert_eq!(err, "Invalid timezone: \"Mars/Olympus\"");
    });
}

#[test]
fn missing_timezone_support_is_fatal() {
    let ds = bookstore();
    let config = GatewayConfig::default();
    let translator =
        RequestQueryTranslator::new(&ds, ds.collection(BOOKS).unwrap(), &config, &NoTimezoneSupport);
    let request = RequestSnapshot::new().with_query("timezone", "Europe/Paris");
    assert!(matches!(
        translator.parse_timezone(&request),
        Err(GatewayError::Fatal(_))
    ));
}
