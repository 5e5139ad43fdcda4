use crate::operator::Operator;

/// Failures raised while translating wire input into query-model values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid condition tree: {0}")]
    InvalidConditionTree(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("operator {operator} is not supported on field '{field}'")]
    UnsupportedOperator { field: String, operator: Operator },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid projection: {0}")]
    InvalidProjection(String),

    #[error("cannot invert operator {0}")]
    NotInvertible(Operator),

    #[error("collection '{0}' has no primary key")]
    NoPrimaryKey(String),

    #[error("primary key '{0}' is missing from the record")]
    MissingPrimaryKey(String),

    #[error("expected {expected} primary key values, found {got} in '{id}'")]
    IdArity {
        expected: usize,
        got: usize,
        id: String,
    },

    #[error("invalid value '{value}' for primary key '{field}'")]
    InvalidIdPart { field: String, value: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("value of '{field}' fails rule {rule}")]
    ValidationRule { field: String, rule: String },
}
