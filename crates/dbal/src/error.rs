//! Error types for dbal

use thiserror::Error;

/// Result type alias for dbal operations
pub type DbalResult<T> = Result<T, DbalError>;

/// Error types for query building and execution.
///
/// Every variant except [`DbalError::Driver`] and [`DbalError::Decode`] signals caller misuse
/// (or, for [`DbalError::Internal`], a bug in the builder itself). None of them are retriable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbalError {
    /// Malformed condition input: bad shape, wrong arity, empty IN set, unsupported operator.
    #[error("Invalid expression format: {0}")]
    InvalidExpressionFormat(String),

    /// A typed slot received a value of the wrong kind
    #[error("Argument \"{argument}\" expects type \"{expected}\", passed type \"{passed}\"")]
    InvalidArgumentType {
        argument: String,
        expected: String,
        passed: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Feature intentionally unimplemented, or a query/statement execution mismatch
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A join references a name no FROM or JOIN table declares
    #[error(
        "The given reference \"{reference}\" is not part of any FROM or JOIN clause table. {}",
        describe_known(.known)
    )]
    UnknownReference {
        reference: String,
        known: Vec<String>,
    },

    /// An exactly-one-row accessor received more than one row
    #[error("One row expected. More rows received.")]
    MoreRowsReceived,

    /// UPDATE/DELETE executed without a WHERE clause
    #[error("Executing {0} without a WHERE clause is not allowed")]
    EmptyWhereNotAllowed(String),

    /// Builder invariant violated
    #[error("Internal error: {0}")]
    Internal(String),

    /// Error reported by the connection collaborator
    #[error("Driver error: {0}")]
    Driver(String),

    /// Row value decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },
}

fn describe_known(known: &[String]) -> String {
    if known.is_empty() {
        "No registered references.".to_string()
    } else {
        format!("The currently registered references are: {}.", known.join(", "))
    }
}

impl DbalError {
    /// Create an invalid expression format error
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidExpressionFormat(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an invalid argument type error
    pub fn invalid_argument_type(
        argument: impl Into<String>,
        expected: impl Into<String>,
        passed: impl Into<String>,
    ) -> Self {
        Self::InvalidArgumentType {
            argument: argument.into(),
            expected: expected.into(),
            passed: passed.into(),
        }
    }

    /// Create a not supported error
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is an invalid expression format error
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, Self::InvalidExpressionFormat(_))
    }

    /// Check if this is an unknown reference error
    pub fn is_unknown_reference(&self) -> bool {
        matches!(self, Self::UnknownReference { .. })
    }

    /// Check if this is a not supported error
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DbalError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_err) => Self::Driver(format!("{}: {}", db_err.code().code(), db_err.message())),
            None => Self::Driver(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reference_lists_known_refs() {
        let err = DbalError::UnknownReference {
            reference: "zz".into(),
            known: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "The given reference \"zz\" is not part of any FROM or JOIN clause table. \
             The currently registered references are: a, b."
        );
    }

    #[test]
    fn unknown_reference_without_refs() {
        let err = DbalError::UnknownReference {
            reference: "zz".into(),
            known: vec![],
        };
        assert!(err.to_string().ends_with("No registered references."));
    }

    #[test]
    fn invalid_argument_type_message() {
        let err = DbalError::invalid_argument_type("column", "string", "list");
        assert_eq!(
            err.to_string(),
            "Argument \"column\" expects type \"string\", passed type \"list\""
        );
    }
}
