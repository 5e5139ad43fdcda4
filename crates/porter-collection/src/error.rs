use http::StatusCode;
use porter_query::QueryError;

/// Error taxonomy shared by every gateway component.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or ambiguous caller input.
    #[error("{0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator failed.
    #[error("internal error: {0}")]
    Internal(String),

    /// Non-recoverable misconfiguration or an impossible state.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Authorization(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) | GatewayError::Fatal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        GatewayError::Internal(message.to_string())
    }
}

impl From<QueryError> for GatewayError {
    fn from(e: QueryError) -> Self {
        GatewayError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(GatewayError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::Authorization("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(GatewayError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::Fatal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn query_errors_become_validation_errors() {
        let err: GatewayError = QueryError::MissingPrimaryKey("id".into()).into();
        assert!(matches!(err, GatewayError::Validation(ref m) if m.contains("'id'")));
    }
}
