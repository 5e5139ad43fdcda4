use std::cmp::Ordering;

use porter_query::{Aggregator, ConditionTree, ConditionLeaf, Operator, Record, Sort};
use regex::RegexBuilder;
use serde_json::Value;

/// Evaluate `tree` against one record. Date-relative operators never match.
pub fn matches(tree: &ConditionTree, record: &Record) -> bool {
    match tree {
        ConditionTree::Leaf(leaf) => matches_leaf(leaf, record),
        ConditionTree::Branch(branch) => match branch.aggregator {
            Aggregator::And => branch.conditions.iter().all(|c| matches(c, record)),
            Aggregator::Or => branch.conditions.iter().any(|c| matches(c, record)),
        },
    }
}

/// Value at `path`, walking `relation:field` into nested objects.
pub fn lookup<'r>(record: &'r Record, path: &str) -> Option<&'r Value> {
    match path.split_once(':') {
        None => record.get(path),
        Some((head, rest)) => match record.get(head)? {
            Value::Object(nested) => lookup(nested, rest),
            _ => None,
        },
    }
}

fn matches_leaf(leaf: &ConditionLeaf, record: &Record) -> bool {
    let actual = lookup(record, &leaf.field).filter(|v| !v.is_null());
    let expected = &leaf.value;

    match leaf.operator {
        Operator::Present => actual.is_some_and(|v| v.as_str() != Some("")),
        Operator::Blank => actual.is_none_or(|v| v.as_str() == Some("")),
        Operator::Missing => actual.is_none(),
        Operator::Equal => actual.is_some_and(|v| compare(v, expected) == Some(Ordering::Equal)),
        Operator::NotEqual => actual.is_none_or(|v| compare(v, expected) != Some(Ordering::Equal)),
        Operator::LessThan | Operator::Before => {
            ordered(actual, expected, |o| o == Ordering::Less)
        }
        Operator::LessThanOrEqual => ordered(actual, expected, |o| o != Ordering::Greater),
        Operator::GreaterThan | Operator::After => {
            ordered(actual, expected, |o| o == Ordering::Greater)
        }
        Operator::GreaterThanOrEqual => ordered(actual, expected, |o| o != Ordering::Less),
        Operator::In => actual.is_some_and(|v| contains_value(expected, v)),
        Operator::NotIn => actual.is_none_or(|v| !contains_value(expected, v)),
        Operator::Like => text_match(actual, expected, false, like),
        Operator::ILike => text_match(actual, expected, true, like),
        Operator::Contains => text_match(actual, expected, false, |a, e| a.contains(e)),
        Operator::NotContains => !text_match(actual, expected, false, |a, e| a.contains(e)),
        Operator::IContains => text_match(actual, expected, true, |a, e| a.contains(e)),
        Operator::StartsWith => text_match(actual, expected, false, |a, e| a.starts_with(e)),
        Operator::IStartsWith => text_match(actual, expected, true, |a, e| a.starts_with(e)),
        Operator::EndsWith => text_match(actual, expected, false, |a, e| a.ends_with(e)),
        Operator::IEndsWith => text_match(actual, expected, true, |a, e| a.ends_with(e)),
        Operator::IncludesAll => match (actual, expected) {
            (Some(Value::Array(have)), Value::Array(want)) => want
                .iter()
                .all(|w| have.iter().any(|h| compare(h, w) == Some(Ordering::Equal))),
            _ => false,
        },
        Operator::Today | Operator::Yesterday | Operator::Past | Operator::Future => false,
    }
}

/// Total-ish order over JSON scalars: numbers numerically, strings and
/// booleans by value. Mixed types do not compare.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Compare two records by `sort`; nulls sort first.
pub fn compare_records(sort: &Sort, a: &Record, b: &Record) -> Ordering {
    for clause in sort.clauses() {
        let left = lookup(a, &clause.field).unwrap_or(&Value::Null);
        let right = lookup(b, &clause.field).unwrap_or(&Value::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
        };
        let ordering = if clause.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn ordered(actual: Option<&Value>, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    actual
        .and_then(|v| compare(v, expected))
        .is_some_and(accept)
}

fn contains_value(list: &Value, value: &Value) -> bool {
    match list {
        Value::Array(items) => items
            .iter()
            .any(|item| compare(item, value) == Some(Ordering::Equal)),
        other => compare(other, value) == Some(Ordering::Equal),
    }
}

fn text_match(
    actual: Option<&Value>,
    expected: &Value,
    insensitive: bool,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    let (Some(Value::String(actual)), Value::String(expected)) = (actual, expected) else {
        return false;
    };
    if insensitive {
        test(&actual.to_lowercase(), &expected.to_lowercase())
    } else {
        test(actual, expected)
    }
}

/// SQL `LIKE` with `%` and `_` wildcards.
fn like(actual: &str, pattern: &str) -> bool {
    let mut source = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    RegexBuilder::new(&source)
        .dot_matches_new_line(true)
        .build()
        .is_ok_and(|re| re.is_match(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn evaluates_branches() {
        let row = record(json!({ "id": 3, "title": "Dune", "author": { "name": "Herbert" } }));
        let tree = ConditionTree::branch(
            Aggregator::And,
            vec![
                ConditionTree::leaf("id", Operator::In, json!([1, 3])),
                ConditionTree::leaf("author:name", Operator::StartsWith, json!("Her")),
            ],
        );
        assert!(matches(&tree, &row));
        assert!(!matches(
            &ConditionTree::leaf("title", Operator::Like, json!("D_x%")),
            &row
        ));
        assert!(matches(
            &ConditionTree::leaf("title", Operator::ILike, json!("d%")),
            &row
        ));
    }

    #[test]
    fn empty_or_matches_nothing() {
        let row = record(json!({ "id": 1 }));
        let tree = ConditionTree::Branch(porter_query::ConditionBranch {
            aggregator: Aggregator::Or,
            conditions: vec![],
        });
        assert!(!matches(&tree, &row));
    }
}
