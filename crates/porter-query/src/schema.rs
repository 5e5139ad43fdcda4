use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;
use crate::operator::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Number,
    String,
    Date,
    Dateonly,
    Timeonly,
    Uuid,
    Enum,
    Json,
    Binary,
}

/// Declarative rule a column value must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", content = "value")]
pub enum ColumnValidation {
    Present,
    GreaterThan(f64),
    LessThan(f64),
    LongerThan(usize),
    ShorterThan(usize),
    Contains(String),
    Match(Pattern),
}

/// A regular expression compiled once, when the rule is built or decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, QueryError> {
        Regex::new(pattern)
            .map(Pattern)
            .map_err(|e| QueryError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl TryFrom<String> for Pattern {
    type Error = QueryError;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Pattern::new(&pattern)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> String {
        pattern.as_str().to_string()
    }
}

impl ColumnValidation {
    /// A `Match` rule; an invalid pattern is reported here rather than
    /// rejecting every value later.
    pub fn matching(pattern: &str) -> Result<Self, QueryError> {
        Pattern::new(pattern).map(ColumnValidation::Match)
    }

    pub fn check(&self, value: &Value) -> bool {
        match self {
            ColumnValidation::Present => !value.is_null(),
            ColumnValidation::GreaterThan(limit) => value.as_f64().is_some_and(|v| v > *limit),
            ColumnValidation::LessThan(limit) => value.as_f64().is_some_and(|v| v < *limit),
            ColumnValidation::LongerThan(len) => {
                value.as_str().is_some_and(|s| s.chars().count() > *len)
            }
            ColumnValidation::ShorterThan(len) => {
                value.as_str().is_some_and(|s| s.chars().count() < *len)
            }
            ColumnValidation::Contains(needle) => {
                value.as_str().is_some_and(|s| s.contains(needle.as_str()))
            }
            ColumnValidation::Match(pattern) => value.as_str().is_some_and(|s| pattern.is_match(s)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ColumnValidation::Present => "Present".into(),
            ColumnValidation::GreaterThan(v) => format!("GreaterThan({v})"),
            ColumnValidation::LessThan(v) => format!("LessThan({v})"),
            ColumnValidation::LongerThan(v) => format!("LongerThan({v})"),
            ColumnValidation::ShorterThan(v) => format!("ShorterThan({v})"),
            ColumnValidation::Contains(v) => format!("Contains({v})"),
            ColumnValidation::Match(v) => format!("Match({})", v.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_sortable: bool,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub filter_operators: BTreeSet<Operator>,
    #[serde(default)]
    pub validation: Vec<ColumnValidation>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_primary_key: false,
            is_sortable: false,
            is_read_only: false,
            filter_operators: BTreeSet::new(),
            validation: Vec::new(),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.is_sortable = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    pub fn operators(mut self, operators: impl IntoIterator<Item = Operator>) -> Self {
        self.filter_operators.extend(operators);
        self
    }

    pub fn rule(mut self, rule: ColumnValidation) -> Self {
        self.validation.push(rule);
        self
    }

    pub fn supports(&self, operator: Operator) -> bool {
        self.filter_operators.contains(&operator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationType {
    ManyToOne,
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// A link to another collection.
///
/// For `ManyToOne`, `foreign_key` is the local column and
/// `foreign_key_target` the referenced column of the foreign collection.
/// For the other kinds both name columns of the foreign side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSchema {
    pub name: String,
    pub relation_type: RelationType,
    pub foreign_collection: String,
    pub foreign_key: String,
    pub foreign_key_target: String,
}

impl RelationSchema {
    /// Relations whose target is a single record, which projections may traverse.
    pub fn is_single(&self) -> bool {
        matches!(
            self.relation_type,
            RelationType::ManyToOne | RelationType::OneToOne
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSchema {
    Column(ColumnSchema),
    Relation(RelationSchema),
}

impl FieldSchema {
    pub fn name(&self) -> &str {
        match self {
            FieldSchema::Column(c) => &c.name,
            FieldSchema::Relation(r) => &r.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionScope {
    Single,
    Bulk,
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    pub scope: ActionScope,
}

impl ActionSchema {
    pub fn new(name: impl Into<String>, scope: ActionScope) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    /// `Single` actions never run against more than one record.
    pub fn accepts_many(&self) -> bool {
        self.scope != ActionScope::Single
    }
}

/// Read-only capability metadata for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ActionSchema>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            searchable: false,
            segments: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.fields.push(FieldSchema::Column(column));
        self
    }

    pub fn relation(mut self, relation: RelationSchema) -> Self {
        self.fields.push(FieldSchema::Relation(relation));
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn segment(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }

    pub fn action(mut self, action: ActionSchema) -> Self {
        self.actions.push(action);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        match self.get_field(name)? {
            FieldSchema::Column(c) => Some(c),
            FieldSchema::Relation(_) => None,
        }
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationSchema> {
        match self.get_field(name)? {
            FieldSchema::Relation(r) => Some(r),
            FieldSchema::Column(_) => None,
        }
    }

    pub fn get_action(&self, name: &str) -> Option<&ActionSchema> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.fields.iter().filter_map(|f| match f {
            FieldSchema::Column(c) => Some(c),
            FieldSchema::Relation(_) => None,
        })
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationSchema> {
        self.fields.iter().filter_map(|f| match f {
            FieldSchema::Relation(r) => Some(r),
            FieldSchema::Column(_) => None,
        })
    }

    /// Primary-key columns in declaration order.
    pub fn primary_keys(&self) -> Vec<&ColumnSchema> {
        self.columns().filter(|c| c.is_primary_key).collect()
    }

    pub fn primary_key_names(&self) -> Vec<String> {
        self.primary_keys().iter().map(|c| c.name.clone()).collect()
    }
}

/// The set of collection schemas visible to the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datasource {
    collections: BTreeMap<String, CollectionSchema>,
}

impl Datasource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, schema: CollectionSchema) -> Self {
        self.collections.insert(schema.name.clone(), schema);
        self
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    pub fn collections(&self) -> impl Iterator<Item = &CollectionSchema> {
        self.collections.values()
    }

    /// Resolve a column path relative to `schema`.
    ///
    /// Plain names resolve to a local column; `relation:field` walks single
    /// relations into the foreign collection, recursively.
    pub fn resolve_column<'a>(
        &'a self,
        schema: &'a CollectionSchema,
        path: &str,
    ) -> Option<&'a ColumnSchema> {
        match path.split_once(':') {
            None => schema.get_column(path),
            Some((relation, rest)) => {
                let relation = schema.get_relation(relation)?;
                if !relation.is_single() {
                    return None;
                }
                let foreign = self.collection(&relation.foreign_collection)?;
                self.resolve_column(foreign, rest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn datasource() -> Datasource {
        Datasource::new()
            .with_collection(
                CollectionSchema::new("books")
                    .column(ColumnSchema::new("id", ColumnType::Number).primary_key())
                    .column(ColumnSchema::new("title", ColumnType::String))
                    .column(ColumnSchema::new("author_id", ColumnType::Number))
                    .relation(RelationSchema {
                        name: "author".into(),
                        relation_type: RelationType::ManyToOne,
                        foreign_collection: "authors".into(),
                        foreign_key: "author_id".into(),
                        foreign_key_target: "id".into(),
                    }),
            )
            .with_collection(
                CollectionSchema::new("authors")
                    .column(ColumnSchema::new("id", ColumnType::Number).primary_key())
                    .column(ColumnSchema::new("name", ColumnType::String)),
            )
    }

    #[test]
    fn resolves_nested_column_paths() {
        let ds = datasource();
        let books = ds.collection("books").unwrap();
        assert_eq!(ds.resolve_column(books, "title").unwrap().name, "title");
        assert_eq!(ds.resolve_column(books, "author:name").unwrap().name, "name");
        assert!(ds.resolve_column(books, "author:missing").is_none());
        assert!(ds.resolve_column(books, "author").is_none());
    }

    #[test]
    fn primary_keys_keep_declaration_order() {
        let schema = CollectionSchema::new("pairs")
            .column(ColumnSchema::new("b", ColumnType::String).primary_key())
            .column(ColumnSchema::new("x", ColumnType::String))
            .column(ColumnSchema::new("a", ColumnType::String).primary_key());
        assert_eq!(schema.primary_key_names(), vec!["b", "a"]);
    }

    #[test]
    fn validation_rules() {
        assert!(ColumnValidation::GreaterThan(3.0).check(&json!(4)));
        assert!(!ColumnValidation::GreaterThan(3.0).check(&json!(3)));
        let lowercase = ColumnValidation::matching("^[a-z]+$").unwrap();
        assert!(lowercase.check(&json!("abc")));
        assert!(!lowercase.check(&json!("ABC")));
        assert!(!lowercase.check(&json!(12)));
        assert!(!ColumnValidation::Present.check(&Value::Null));
        assert!(ColumnValidation::ShorterThan(4).check(&json!("abc")));
    }

    #[test]
    fn bad_match_patterns_are_reported() {
        let err = ColumnValidation::matching("[a-z").unwrap_err();
        assert!(matches!(err, QueryError::InvalidPattern { ref pattern, .. } if pattern == "[a-z"));

        let decoded: Result<ColumnValidation, _> =
            serde_json::from_value(json!({ "operator": "Match", "value": "(" }));
        assert!(decoded.is_err());

        let decoded: ColumnValidation =
            serde_json::from_value(json!({ "operator": "Match", "value": "^\\d+$" })).unwrap();
        assert!(decoded.check(&json!("42")));
        assert_eq!(decoded.describe(), "Match(^\\d+$)");
    }

    #[test]
    fn only_single_actions_refuse_many_records() {
        assert!(!ActionSchema::new("Feature", ActionScope::Single).accepts_many());
        assert!(ActionSchema::new("Restock", ActionScope::Bulk).accepts_many());
        assert!(ActionSchema::new("Download catalog", ActionScope::Global).accepts_many());
    }
}
