use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition_tree::{Aggregator, ConditionTree};
use crate::error::QueryError;
use crate::operator::Operator;
use crate::parse_filter::parse_number;
use crate::schema::{CollectionSchema, ColumnType};

pub type Record = Map<String, Value>;

const SEPARATOR: char = '|';

/// Primary-key values aligned with the schema's primary-key column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeId(pub Vec<Value>);

impl CompositeId {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// The `|`-joined wire form.
    pub fn pack(&self) -> String {
        self.0.iter().map(stringify).collect::<Vec<_>>().join("|")
    }

    /// Extract the primary-key values of `record`.
    pub fn from_record(schema: &CollectionSchema, record: &Record) -> Result<CompositeId, QueryError> {
        let pks = schema.primary_keys();
        if pks.is_empty() {
            return Err(QueryError::NoPrimaryKey(schema.name.clone()));
        }
        pks.iter()
            .map(|pk| match record.get(&pk.name) {
                None | Some(Value::Null) => Err(QueryError::MissingPrimaryKey(pk.name.clone())),
                Some(value) => Ok(value.clone()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CompositeId)
    }
}

/// Pack the primary key of `record` into its `|`-joined wire form.
pub fn pack_id(schema: &CollectionSchema, record: &Record) -> Result<String, QueryError> {
    Ok(CompositeId::from_record(schema, record)?.pack())
}

/// Split a packed identifier and cast each part to its column type.
///
/// Values that themselves contain `|` cannot round-trip: there is no escaping.
pub fn unpack_id(schema: &CollectionSchema, packed: &str) -> Result<CompositeId, QueryError> {
    let pks = schema.primary_keys();
    if pks.is_empty() {
        return Err(QueryError::NoPrimaryKey(schema.name.clone()));
    }

    let parts: Vec<&str> = packed.split(SEPARATOR).collect();
    if parts.len() != pks.len() {
        return Err(QueryError::IdArity {
            expected: pks.len(),
            got: parts.len(),
            id: packed.to_string(),
        });
    }

    let mut values = Vec::with_capacity(parts.len());
    for (column, part) in pks.iter().zip(parts) {
        let value = match column.column_type {
            ColumnType::Number => parse_number(part).ok_or_else(|| QueryError::InvalidIdPart {
                field: column.name.clone(),
                value: part.to_string(),
            })?,
            _ => Value::String(part.to_string()),
        };
        if let Some(rule) = column.validation.iter().find(|rule| !rule.check(&value)) {
            return Err(QueryError::ValidationRule {
                field: column.name.clone(),
                rule: rule.describe(),
            });
        }
        values.push(value);
    }
    Ok(CompositeId(values))
}

pub fn unpack_ids(schema: &CollectionSchema, packed: &[String]) -> Result<Vec<CompositeId>, QueryError> {
    packed.iter().map(|p| unpack_id(schema, p)).collect()
}

/// Condition tree selecting exactly the records identified by `ids`.
///
/// - no ids → an empty Or, which matches nothing
/// - single-column key → `Equal` for one id, `In` otherwise
/// - multi-column key → Or of And(Equal, ...) per id
pub fn match_ids(schema: &CollectionSchema, ids: &[CompositeId]) -> Result<ConditionTree, QueryError> {
    let pks = schema.primary_key_names();
    if pks.is_empty() {
        return Err(QueryError::NoPrimaryKey(schema.name.clone()));
    }
    for id in ids {
        if id.0.len() != pks.len() {
            return Err(QueryError::IdArity {
                expected: pks.len(),
                got: id.0.len(),
                id: id.pack(),
            });
        }
    }

    if ids.is_empty() {
        return Ok(ConditionTree::branch(Aggregator::Or, Vec::new()));
    }

    if let [pk] = pks.as_slice() {
        let mut values: Vec<Value> = ids.iter().map(|id| id.0[0].clone()).collect();
        return Ok(if values.len() == 1 {
            ConditionTree::leaf(pk.clone(), Operator::Equal, values.remove(0))
        } else {
            ConditionTree::leaf(pk.clone(), Operator::In, Value::Array(values))
        });
    }

    let per_id = ids
        .iter()
        .map(|id| {
            let equals = pks
                .iter()
                .zip(&id.0)
                .map(|(pk, value)| ConditionTree::leaf(pk.clone(), Operator::Equal, value.clone()))
                .collect();
            ConditionTree::branch(Aggregator::And, equals)
        })
        .collect();
    Ok(ConditionTree::branch(Aggregator::Or, per_id))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ColumnValidation};
    use serde_json::json;

    fn pair_schema() -> CollectionSchema {
        CollectionSchema::new("pairs")
            .column(ColumnSchema::new("idA", ColumnType::String).primary_key())
            .column(ColumnSchema::new("idB", ColumnType::String).primary_key())
            .column(ColumnSchema::new("label", ColumnType::String))
    }

    fn mixed_schema() -> CollectionSchema {
        CollectionSchema::new("mixed")
            .column(
                ColumnSchema::new("shard", ColumnType::Number)
                    .primary_key()
                    .rule(ColumnValidation::LessThan(100.0)),
            )
            .column(ColumnSchema::new("key", ColumnType::Uuid).primary_key())
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn packs_in_schema_order() {
        let r = record(json!({ "idB": "B", "label": "x", "idA": "A" }));
        assert_eq!(pack_id(&pair_schema(), &r).unwrap(), "A|B");
    }

    #[test]
    fn unpack_reverses_pack() {
        assert_eq!(
            unpack_id(&pair_schema(), "A|B").unwrap(),
            CompositeId(vec![json!("A"), json!("B")])
        );

        let r = record(json!({ "shard": 7, "key": "abc" }));
        let packed = pack_id(&mixed_schema(), &r).unwrap();
        assert_eq!(packed, "7|abc");
        assert_eq!(
            unpack_id(&mixed_schema(), &packed).unwrap(),
            CompositeId(vec![json!(7), json!("abc")])
        );
    }

    #[test]
    fn pack_errors_are_distinct() {
        let no_pk = CollectionSchema::new("logs").column(ColumnSchema::new("line", ColumnType::String));
        assert_eq!(
            pack_id(&no_pk, &record(json!({ "line": "x" }))).unwrap_err(),
            QueryError::NoPrimaryKey("logs".into())
        );
        assert_eq!(
            pack_id(&pair_schema(), &record(json!({ "idA": "A" }))).unwrap_err(),
            QueryError::MissingPrimaryKey("idB".into())
        );
    }

    #[test]
    fn unpack_checks_arity() {
        assert_eq!(
            unpack_id(&pair_schema(), "A|B|C").unwrap_err(),
            QueryError::IdArity {
                expected: 2,
                got: 3,
                id: "A|B|C".into()
            }
        );
        assert!(matches!(
            unpack_id(&pair_schema(), "A").unwrap_err(),
            QueryError::IdArity { got: 1, .. }
        ));
    }

    #[test]
    fn unpack_casts_and_validates() {
        assert!(matches!(
            unpack_id(&mixed_schema(), "seven|abc").unwrap_err(),
            QueryError::InvalidIdPart { ref field, .. } if field == "shard"
        ));
        assert!(matches!(
            unpack_id(&mixed_schema(), "500|abc").unwrap_err(),
            QueryError::ValidationRule { ref field, .. } if field == "shard"
        ));
    }

    #[test]
    fn match_ids_single_and_composite() {
        let single = CollectionSchema::new("books")
            .column(ColumnSchema::new("id", ColumnType::Number).primary_key());
        assert_eq!(
            match_ids(&single, &[CompositeId(vec![json!(1)])]).unwrap(),
            ConditionTree::leaf("id", Operator::Equal, json!(1))
        );
        assert_eq!(
            match_ids(&single, &[CompositeId(vec![json!(1)]), CompositeId(vec![json!(2)])]).unwrap(),
            ConditionTree::leaf("id", Operator::In, json!([1, 2]))
        );

        let tree = match_ids(
            &pair_schema(),
            &[
                CompositeId(vec![json!("A"), json!("B")]),
                CompositeId(vec![json!("C"), json!("D")]),
            ],
        )
        .unwrap();
        match tree {
            ConditionTree::Branch(or) => {
                assert_eq!(or.aggregator, Aggregator::Or);
                assert_eq!(or.conditions.len(), 2);
                assert!(matches!(&or.conditions[0], ConditionTree::Branch(and) if and.conditions.len() == 2));
            }
            _ => panic!("expected branch"),
        }
    }

    #[test]
    fn match_no_ids_matches_nothing() {
        let tree = match_ids(&pair_schema(), &[]).unwrap();
        assert!(matches!(tree, ConditionTree::Branch(ref b) if b.aggregator == Aggregator::Or && b.conditions.is_empty()));
    }
}
