use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition_tree::ConditionTree;
use crate::schema::CollectionSchema;

/// Per-request filter. Built once from wire input and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    pub condition_tree: Option<ConditionTree>,
    pub search: Option<String>,
    pub search_extended: bool,
    pub segment: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    pub field: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort(pub Vec<SortClause>);

impl Sort {
    /// Ascending by every primary-key column, in declaration order.
    pub fn by_primary_key(schema: &CollectionSchema) -> Sort {
        Sort(
            schema
                .primary_key_names()
                .into_iter()
                .map(|field| SortClause {
                    field,
                    ascending: true,
                })
                .collect(),
        )
    }

    pub fn clauses(&self) -> &[SortClause] {
        &self.0
    }
}

/// Primary-key values of the last row seen, in primary-key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor(pub Vec<Value>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
    pub cursor: Option<Cursor>,
}

impl Page {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit,
            cursor: None,
        }
    }

    pub fn after(cursor: Cursor, limit: usize) -> Self {
        Self {
            skip: 0,
            limit,
            cursor: Some(cursor),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaginatedFilter {
    pub filter: Filter,
    pub sort: Sort,
    pub page: Option<Page>,
}

/// Replacement values for selected parts of a [`PaginatedFilter`].
///
/// `condition_tree` is doubly optional so a caller can clear the tree
/// (`Some(None)`) as well as keep it (`None`).
#[derive(Debug, Clone, Default)]
pub struct FilterOverrides {
    pub condition_tree: Option<Option<ConditionTree>>,
    pub search: Option<Option<String>>,
    pub search_extended: Option<bool>,
    pub segment: Option<Option<String>>,
    pub timezone: Option<Option<String>>,
    pub sort: Option<Sort>,
    pub page: Option<Option<Page>>,
}

impl PaginatedFilter {
    pub fn new(filter: Filter, sort: Sort, page: Option<Page>) -> Self {
        Self { filter, sort, page }
    }

    /// A copy with every field named by `overrides` replaced.
    pub fn with_overrides(&self, overrides: FilterOverrides) -> PaginatedFilter {
        let mut next = self.clone();
        if let Some(tree) = overrides.condition_tree {
            next.filter.condition_tree = tree;
        }
        if let Some(search) = overrides.search {
            next.filter.search = search;
        }
        if let Some(extended) = overrides.search_extended {
            next.filter.search_extended = extended;
        }
        if let Some(segment) = overrides.segment {
            next.filter.segment = segment;
        }
        if let Some(timezone) = overrides.timezone {
            next.filter.timezone = timezone;
        }
        if let Some(sort) = overrides.sort {
            next.sort = sort;
        }
        if let Some(page) = overrides.page {
            next.page = page;
        }
        next
    }

    pub fn with_sort(&self, sort: Sort) -> PaginatedFilter {
        self.with_overrides(FilterOverrides {
            sort: Some(sort),
            ..Default::default()
        })
    }

    pub fn with_page(&self, page: Page) -> PaginatedFilter {
        self.with_overrides(FilterOverrides {
            page: Some(Some(page)),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateOperation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub operation: AggregateOperation,
    pub field: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Aggregation {
    pub fn count() -> Self {
        Self {
            operation: AggregateOperation::Count,
            field: None,
            groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub value: Value,
    #[serde(default)]
    pub group: serde_json::Map<String, Value>,
}
