//! Error types for query operations.

/// Message carried by the type error raised when a range query is not
/// backed by an instant vector expression.
pub const NOT_VECTOR_MESSAGE: &str = "expression does not evaluate to vector type";

/// Error type for query operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query text could not be parsed.
    Parse(String),

    /// The expression has the wrong evaluation type for the operation.
    Type(String),

    /// The evaluator failed or does not support the expression.
    Execution(String),

    /// The metric metadata store failed.
    Storage(String),

    /// A result could not be serialized.
    Serialization(String),
}

impl QueryError {
    /// The canonical error for a range query over a non-vector expression.
    pub fn not_vector() -> Self {
        QueryError::Type(NOT_VECTOR_MESSAGE.to_string())
    }

    /// Returns the bare message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            QueryError::Parse(msg)
            | QueryError::Type(msg)
            | QueryError::Execution(msg)
            | QueryError::Storage(msg)
            | QueryError::Serialization(msg) => msg,
        }
    }

    /// Prometheus-style error classification used in JSON error envelopes.
    pub fn error_type(&self) -> &'static str {
        match self {
            QueryError::Parse(_) | QueryError::Type(_) => "bad_data",
            QueryError::Execution(_) => "execution",
            QueryError::Storage(_) | QueryError::Serialization(_) => "internal",
        }
    }
}

impl std::error::Error for QueryError {}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Parse(msg) => write!(f, "Parse error: {}", msg),
            QueryError::Type(msg) => write!(f, "Type error: {}", msg),
            QueryError::Execution(msg) => write!(f, "Execution error: {}", msg),
            QueryError::Storage(msg) => write!(f, "Storage error: {}", msg),
            QueryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_not_vector_type_error() {
        // given/when
        let err = QueryError::not_vector();

        // then
        assert_eq!(err.message(), "expression does not evaluate to vector type");
        assert_eq!(err.error_type(), "bad_data");
    }

    #[test]
    fn should_prefix_display_with_kind() {
        assert_eq!(
            QueryError::Storage("disk unavailable".into()).to_string(),
            "Storage error: disk unavailable"
        );
        assert_eq!(
            QueryError::Parse("unexpected EOF".into()).to_string(),
            "Parse error: unexpected EOF"
        );
    }

    #[test]
    fn should_classify_internal_errors() {
        assert_eq!(QueryError::Storage("x".into()).error_type(), "internal");
        assert_eq!(QueryError::Serialization("x".into()).error_type(), "internal");
        assert_eq!(QueryError::Execution("x".into()).error_type(), "execution");
    }

    #[test]
    fn should_convert_serde_json_errors() {
        // given
        let err = serde_json::from_str::<Vec<String>>("not json").unwrap_err();

        // when
        let err = QueryError::from(err);

        // then
        assert!(matches!(err, QueryError::Serialization(_)));
    }
}
