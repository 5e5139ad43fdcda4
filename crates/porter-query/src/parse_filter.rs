use serde_json::{Map, Number, Value};

use crate::condition_tree::{Aggregator, ConditionTree};
use crate::error::QueryError;
use crate::operator::Operator;
use crate::schema::{CollectionSchema, ColumnType, Datasource};

const FALSY_TOKENS: [&str; 3] = ["false", "0", "no"];

/// Parse a wire condition tree into a [`ConditionTree`].
///
/// - `{ "field", "operator", "value" }` is a leaf
/// - `{ "aggregator", "conditions": [...] }` is a branch; `or` in any casing
///   selects Or, everything else And
/// - a branch that ends up with one condition is replaced by that condition
/// - an `In` leaf whose value is a single string is split on commas and
///   coerced per the column type (the split has no escaping, so values
///   containing a comma cannot be expressed this way)
pub fn parse_condition_tree(
    datasource: &Datasource,
    schema: &CollectionSchema,
    raw: &Value,
) -> Result<ConditionTree, QueryError> {
    let object = raw
        .as_object()
        .ok_or_else(|| QueryError::InvalidConditionTree("expected an object".into()))?;

    if object.contains_key("field") && object.contains_key("operator") {
        return parse_leaf(datasource, schema, object);
    }

    if object.contains_key("aggregator") && object.contains_key("conditions") {
        let aggregator = object
            .get("aggregator")
            .and_then(Value::as_str)
            .map(Aggregator::from_wire)
            .unwrap_or(Aggregator::And);
        let conditions = object
            .get("conditions")
            .and_then(Value::as_array)
            .ok_or_else(|| QueryError::InvalidConditionTree("conditions must be an array".into()))?
            .iter()
            .map(|child| parse_condition_tree(datasource, schema, child))
            .collect::<Result<Vec<_>, _>>()?;

        return Ok(ConditionTree::branch(aggregator, conditions));
    }

    Err(QueryError::InvalidConditionTree(
        "expected a leaf (field, operator) or a branch (aggregator, conditions)".into(),
    ))
}

fn parse_leaf(
    datasource: &Datasource,
    schema: &CollectionSchema,
    object: &Map<String, Value>,
) -> Result<ConditionTree, QueryError> {
    let field = object
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::InvalidConditionTree("field must be a string".into()))?;
    let operator = object
        .get("operator")
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::InvalidConditionTree("operator must be a string".into()))?;
    let operator = Operator::from_wire(operator)?;
    let value = object.get("value").cloned().unwrap_or(Value::Null);

    let value = match (&operator, &value) {
        (Operator::In, Value::String(list)) => {
            let column_type = datasource
                .resolve_column(schema, field)
                .map(|c| c.column_type);
            split_in_list(list, column_type)
        }
        _ => value,
    };

    Ok(ConditionTree::leaf(field, operator, value))
}

fn split_in_list(list: &str, column_type: Option<ColumnType>) -> Value {
    let tokens = list.split(',').map(str::trim);
    let values = match column_type {
        Some(ColumnType::Boolean) => tokens
            .map(|t| {
                let falsy = FALSY_TOKENS.iter().any(|f| t.eq_ignore_ascii_case(f));
                Value::Bool(!falsy)
            })
            .collect(),
        Some(ColumnType::Number) => tokens.filter_map(parse_number).collect(),
        _ => tokens.map(|t| Value::String(t.to_string())).collect(),
    };
    Value::Array(values)
}

/// Parse a finite number, keeping integral values integral.
pub(crate) fn parse_number(token: &str) -> Option<Value> {
    if let Ok(int) = token.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    let float = token.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(float).map(Value::Number)
}

/// Check every leaf against the per-field operator support declared by the schema.
pub fn validate_condition_tree(
    datasource: &Datasource,
    schema: &CollectionSchema,
    tree: &ConditionTree,
) -> Result<(), QueryError> {
    for leaf in tree.leaves() {
        let column = datasource
            .resolve_column(schema, &leaf.field)
            .ok_or_else(|| QueryError::UnknownField(leaf.field.clone()))?;
        if !column.supports(leaf.operator) {
            return Err(QueryError::UnsupportedOperator {
                field: leaf.field.clone(),
                operator: leaf.operator,
            });
        }
    }
    Ok(())
}
