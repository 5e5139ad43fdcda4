use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Closed set of comparison operators a condition leaf can carry.
///
/// Wire input arrives in snake_case (`less_than`) and is normalized with
/// [`normalize_operator_name`] before matching a variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    Present,
    Blank,
    Missing,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    Like,
    ILike,
    Contains,
    NotContains,
    IContains,
    StartsWith,
    EndsWith,
    IStartsWith,
    IEndsWith,
    IncludesAll,
    Before,
    After,
    Today,
    Yesterday,
    Past,
    Future,
}

impl Operator {
    pub const ALL: [Operator; 27] = [
        Operator::Present,
        Operator::Blank,
        Operator::Missing,
        Operator::Equal,
        Operator::NotEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::In,
        Operator::NotIn,
        Operator::Like,
        Operator::ILike,
        Operator::Contains,
        Operator::NotContains,
        Operator::IContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::IStartsWith,
        Operator::IEndsWith,
        Operator::IncludesAll,
        Operator::Before,
        Operator::After,
        Operator::Today,
        Operator::Yesterday,
        Operator::Past,
        Operator::Future,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Present => "Present",
            Operator::Blank => "Blank",
            Operator::Missing => "Missing",
            Operator::Equal => "Equal",
            Operator::NotEqual => "NotEqual",
            Operator::LessThan => "LessThan",
            Operator::LessThanOrEqual => "LessThanOrEqual",
            Operator::GreaterThan => "GreaterThan",
            Operator::GreaterThanOrEqual => "GreaterThanOrEqual",
            Operator::In => "In",
            Operator::NotIn => "NotIn",
            Operator::Like => "Like",
            Operator::ILike => "ILike",
            Operator::Contains => "Contains",
            Operator::NotContains => "NotContains",
            Operator::IContains => "IContains",
            Operator::StartsWith => "StartsWith",
            Operator::EndsWith => "EndsWith",
            Operator::IStartsWith => "IStartsWith",
            Operator::IEndsWith => "IEndsWith",
            Operator::IncludesAll => "IncludesAll",
            Operator::Before => "Before",
            Operator::After => "After",
            Operator::Today => "Today",
            Operator::Yesterday => "Yesterday",
            Operator::Past => "Past",
            Operator::Future => "Future",
        }
    }

    /// Parse a wire operator (`less_than`, `in`, `LessThan`) into its variant.
    pub fn from_wire(raw: &str) -> Result<Operator, QueryError> {
        let canonical = normalize_operator_name(raw);
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == canonical)
            .ok_or_else(|| QueryError::UnknownOperator(raw.to_string()))
    }

    /// The operator matching exactly the complement of `self`, when one exists.
    pub fn inverse(&self) -> Option<Operator> {
        let inverse = match self {
            Operator::Equal => Operator::NotEqual,
            Operator::NotEqual => Operator::Equal,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::Present => Operator::Blank,
            Operator::Blank => Operator::Present,
            Operator::Contains => Operator::NotContains,
            Operator::NotContains => Operator::Contains,
            Operator::LessThan => Operator::GreaterThanOrEqual,
            Operator::GreaterThanOrEqual => Operator::LessThan,
            Operator::GreaterThan => Operator::LessThanOrEqual,
            Operator::LessThanOrEqual => Operator::GreaterThan,
            _ => return None,
        };
        Some(inverse)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::from_wire(s)
    }
}

/// Convert a snake_case operator into its canonical form.
///
/// The first character is upper-cased, and every character following an
/// underscore is upper-cased while the underscore itself is dropped:
/// `less_than` becomes `LessThan`, `i_contains` becomes `IContains`.
pub fn normalize_operator_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = true;
    for ch in raw.chars() {
        if ch == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_snake_case() {
        assert_eq!(normalize_operator_name("less_than"), "LessThan");
        assert_eq!(normalize_operator_name("greater_than"), "GreaterThan");
        assert_eq!(normalize_operator_name("in"), "In");
        assert_eq!(normalize_operator_name("i_starts_with"), "IStartsWith");
        assert_eq!(normalize_operator_name("NotIn"), "NotIn");
    }

    #[test]
    fn every_operator_round_trips_from_snake_case() {
        for op in Operator::ALL {
            let mut snake = String::new();
            for (i, ch) in op.as_str().chars().enumerate() {
                if ch.is_uppercase() && i > 0 {
                    snake.push('_');
                }
                snake.extend(ch.to_lowercase());
            }
            assert_eq!(Operator::from_wire(&snake).unwrap(), op, "{snake}");
        }
    }

    #[test]
    fn unknown_operator_errors() {
        let err = Operator::from_wire("between").unwrap_err();
        assert!(matches!(err, QueryError::UnknownOperator(ref s) if s == "between"));
    }

    #[test]
    fn inverse_pairs() {
        assert_eq!(Operator::In.inverse(), Some(Operator::NotIn));
        assert_eq!(Operator::Blank.inverse(), Some(Operator::Present));
        assert_eq!(Operator::Today.inverse(), None);
    }
}
