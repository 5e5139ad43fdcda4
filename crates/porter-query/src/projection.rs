use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::QueryError;
use crate::schema::{CollectionSchema, Datasource};

/// Ordered, duplicate-free list of field paths.
///
/// Columns are bare names; fields reached through a relation use
/// `relation:field`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projection(Vec<String>);

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every column of the collection, in declaration order.
    pub fn all_columns(schema: &CollectionSchema) -> Projection {
        schema.columns().map(|c| c.name.clone()).collect()
    }

    pub fn primary_keys(schema: &CollectionSchema) -> Projection {
        schema.primary_key_names().into_iter().collect()
    }

    pub fn push(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.0.contains(&path) {
            self.0.push(path);
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p == path)
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn union(&self, other: &Projection) -> Projection {
        self.iter().chain(other.iter()).map(str::to_string).collect()
    }

    /// Append the collection's primary keys when absent.
    pub fn with_pks(&self, schema: &CollectionSchema) -> Projection {
        self.union(&Projection::primary_keys(schema))
    }

    /// Plain column paths.
    pub fn columns(&self) -> Vec<&str> {
        self.iter().filter(|p| !p.contains(':')).collect()
    }

    /// Sub-projections keyed by the first relation segment.
    pub fn relations(&self) -> BTreeMap<&str, Projection> {
        let mut out: BTreeMap<&str, Projection> = BTreeMap::new();
        for path in &self.0 {
            if let Some((relation, rest)) = path.split_once(':') {
                out.entry(relation).or_default().push(rest);
            }
        }
        out
    }

    /// Check that every path resolves to a column of `schema`.
    pub fn validate(&self, datasource: &Datasource, schema: &CollectionSchema) -> Result<(), QueryError> {
        for path in &self.0 {
            if datasource.resolve_column(schema, path).is_none() {
                return Err(QueryError::InvalidProjection(format!(
                    "'{path}' is not a column of '{}'",
                    schema.name
                )));
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for Projection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut projection = Projection::new();
        for path in iter {
            projection.push(path);
        }
        projection
    }
}
