use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::error::QueryError;
use crate::operator::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Aggregator {
    And,
    Or,
}

impl Aggregator {
    /// `or` in any casing selects [`Aggregator::Or`]; anything else is `And`.
    pub fn from_wire(raw: &str) -> Aggregator {
        if raw.eq_ignore_ascii_case("or") {
            Aggregator::Or
        } else {
            Aggregator::And
        }
    }

    fn flip(self) -> Aggregator {
        match self {
            Aggregator::And => Aggregator::Or,
            Aggregator::Or => Aggregator::And,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionLeaf {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionBranch {
    pub aggregator: Aggregator,
    pub conditions: Vec<ConditionTree>,
}

/// Boolean predicate over collection fields.
///
/// Built through [`ConditionTree::branch`], a branch never holds exactly one
/// child: it collapses into that child.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionTree {
    Leaf(ConditionLeaf),
    Branch(ConditionBranch),
}

impl ConditionTree {
    pub fn leaf(field: impl Into<String>, operator: Operator, value: Value) -> ConditionTree {
        ConditionTree::Leaf(ConditionLeaf {
            field: field.into(),
            operator,
            value,
        })
    }

    pub fn branch(aggregator: Aggregator, mut conditions: Vec<ConditionTree>) -> ConditionTree {
        if conditions.len() == 1 {
            if let Some(only) = conditions.pop() {
                return only;
            }
        }
        ConditionTree::Branch(ConditionBranch {
            aggregator,
            conditions,
        })
    }

    /// AND-intersection where an absent operand yields the other one.
    ///
    /// - Both None → None
    /// - One present → that one
    /// - Both present → And(left, right)
    pub fn intersect(
        left: Option<ConditionTree>,
        right: Option<ConditionTree>,
    ) -> Option<ConditionTree> {
        combine(Aggregator::And, left, right)
    }

    /// OR-union, with the same absent-operand rule as [`ConditionTree::intersect`].
    pub fn union(left: Option<ConditionTree>, right: Option<ConditionTree>) -> Option<ConditionTree> {
        combine(Aggregator::Or, left, right)
    }

    /// Logical complement. Leaves swap to their inverse operator, branches
    /// follow De Morgan.
    pub fn inverse(&self) -> Result<ConditionTree, QueryError> {
        match self {
            ConditionTree::Leaf(leaf) => {
                let operator = leaf
                    .operator
                    .inverse()
                    .ok_or(QueryError::NotInvertible(leaf.operator))?;
                Ok(ConditionTree::leaf(
                    leaf.field.clone(),
                    operator,
                    leaf.value.clone(),
                ))
            }
            ConditionTree::Branch(branch) => {
                let conditions = branch
                    .conditions
                    .iter()
                    .map(ConditionTree::inverse)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ConditionTree::branch(branch.aggregator.flip(), conditions))
            }
        }
    }

    /// Every leaf in depth-first order.
    pub fn leaves(&self) -> Vec<&ConditionLeaf> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    /// Distinct field paths referenced by the tree.
    pub fn fields(&self) -> BTreeSet<&str> {
        self.leaves().into_iter().map(|l| l.field.as_str()).collect()
    }
}

fn combine(
    aggregator: Aggregator,
    left: Option<ConditionTree>,
    right: Option<ConditionTree>,
) -> Option<ConditionTree> {
    match (left, right) {
        (None, None) => None,
        (Some(tree), None) | (None, Some(tree)) => Some(tree),
        (Some(left), Some(right)) => Some(ConditionTree::branch(aggregator, vec![left, right])),
    }
}

fn collect_leaves<'a>(tree: &'a ConditionTree, out: &mut Vec<&'a ConditionLeaf>) {
    match tree {
        ConditionTree::Leaf(leaf) => out.push(leaf),
        ConditionTree::Branch(branch) => {
            for child in &branch.conditions {
                collect_leaves(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eq(field: &str, value: &str) -> ConditionTree {
        ConditionTree::leaf(field, Operator::Equal, json!(value))
    }

    #[test]
    fn single_child_branch_collapses() {
        let tree = ConditionTree::branch(Aggregator::Or, vec![eq("status", "active")]);
        assert_eq!(tree, eq("status", "active"));
    }

    #[test]
    fn empty_branch_is_kept() {
        let tree = ConditionTree::branch(Aggregator::Or, vec![]);
        assert!(matches!(tree, ConditionTree::Branch(ref b) if b.conditions.is_empty()));
    }

    #[test]
    fn intersect_with_absent_operand() {
        assert!(ConditionTree::intersect(None, None).is_none());
        let user = eq("status", "active");
        assert_eq!(
            ConditionTree::intersect(Some(user.clone()), None),
            Some(user.clone())
        );
        assert_eq!(ConditionTree::intersect(None, Some(user.clone())), Some(user));
    }

    #[test]
    fn intersect_both_present() {
        let user = eq("status", "active");
        let scope = eq("owner", "u-1");
        let merged = ConditionTree::intersect(Some(user.clone()), Some(scope.clone())).unwrap();
        match merged {
            ConditionTree::Branch(b) => {
                assert_eq!(b.aggregator, Aggregator::And);
                assert_eq!(b.conditions, vec![user, scope]);
            }
            _ => panic!("expected branch"),
        }
    }

    #[test]
    fn inverse_applies_de_morgan() {
        let tree = ConditionTree::branch(
            Aggregator::And,
            vec![
                ConditionTree::leaf("id", Operator::In, json!([1, 2])),
                eq("status", "active"),
            ],
        );
        let inverted = tree.inverse().unwrap();
        match inverted {
            ConditionTree::Branch(b) => {
                assert_eq!(b.aggregator, Aggregator::Or);
                assert_eq!(
                    b.conditions[0],
                    ConditionTree::leaf("id", Operator::NotIn, json!([1, 2]))
                );
                assert_eq!(
                    b.conditions[1],
                    ConditionTree::leaf("status", Operator::NotEqual, json!("active"))
                );
            }
            _ => panic!("expected branch"),
        }
    }

    #[test]
    fn inverse_of_uninvertible_operator_errors() {
        let tree = ConditionTree::leaf("created_at", Operator::Today, Value::Null);
        assert_eq!(
            tree.inverse().unwrap_err(),
            QueryError::NotInvertible(Operator::Today)
        );
    }

    #[test]
    fn fields_are_collected_once() {
        let tree = ConditionTree::branch(
            Aggregator::Or,
            vec![eq("a", "1"), eq("b", "2"), eq("a", "3")],
        );
        assert_eq!(tree.fields().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(tree.leaves().len(), 3);
    }

    #[test]
    fn serializes_to_wire_shape() {
        let tree = ConditionTree::branch(Aggregator::And, vec![eq("a", "1"), eq("b", "2")]);
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["aggregator"], "And");
        assert_eq!(value["conditions"][0]["operator"], "Equal");
        assert_eq!(value["conditions"][1]["field"], "b");
    }
}
