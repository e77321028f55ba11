//! Error classes for query generation
//!
//! `UserError` means the caller asked for something that cannot be expressed
//! with the given data and must fix the query. `InternalError` means the IR
//! violates an invariant the producer was supposed to enforce.

use cosql_ir::{BinaryOperator, MappingError, UnaryOperator};
use cosql_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("The query dialect does not support OFFSET without LIMIT. Consider adding a limit to the query.")]
    OffsetRequiresLimit,

    #[error("The 'VectorDistance' function requires at least one of its vector arguments to be a property or parameter configured as a vector.")]
    VectorSearchRequiresVector,

    #[error("The '{argument}' argument to '{function}' must be a constant.")]
    ArgumentNotConstant {
        argument: &'static str,
        function: &'static str,
    },

    #[error(
        "Raw SQL arguments must be a parameter or constant holding an array, but got a {expression_type} with value type '{}'.",
        .value_type.as_deref().unwrap_or("<none>")
    )]
    InvalidFromSqlArguments {
        expression_type: &'static str,
        value_type: Option<String>,
    },

    #[error("Raw SQL placeholder {{{index}}} is out of range: {count} argument(s) supplied.")]
    FromSqlPlaceholderOutOfRange { index: usize, count: usize },

    #[error("No value was supplied for parameter '{0}'.")]
    MissingParameterValue(String),
}

#[derive(Debug, Error)]
pub enum InternalError {
    #[error("Unsupported binary operator: {0:?}")]
    UnsupportedBinaryOperator(BinaryOperator),

    #[error("Unsupported unary operator: {0:?}")]
    UnsupportedUnaryOperator(UnaryOperator),

    #[error("{0} expression without a type mapping")]
    MissingTypeMapping(&'static str),

    #[error("In expression values parameter '{0}' must be expanded to constants before SQL generation")]
    UnexpandedInValuesParameter(String),

    #[error("Missing values on In expression")]
    MissingInValues,

    #[error("JOINs not yet supported")]
    JoinsNotSupported,

    #[error("Encountered SelectExpression with uses_single_value_projection=true and {0} projections")]
    SingleValueProjectionArity(usize),

    #[error("Alias cannot be missing on a source with with_in=true")]
    WithInRequiresAlias,

    #[error("Unexpected argument count {count} for '{function}'")]
    UnexpectedArgumentCount { function: &'static str, count: usize },

    #[error("Type mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Type mapping lookup failed: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error("Internal error (invalid IR): {0}")]
    Internal(#[from] InternalError),
}

impl QueryError {
    pub fn is_user_error(&self) -> bool {
        matches!(self, QueryError::User(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, QueryError::Internal(_))
    }
}

impl From<MappingError> for QueryError {
    fn from(err: MappingError) -> Self {
        QueryError::Internal(InternalError::Mapping(err))
    }
}

impl From<RegistryError> for QueryError {
    fn from(err: RegistryError) -> Self {
        QueryError::Internal(InternalError::Registry(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UserError::ArgumentNotConstant {
            argument: "useBruteForce",
            function: "VectorDistance",
        };
        assert_eq!(
            err.to_string(),
            "The 'useBruteForce' argument to 'VectorDistance' must be a constant."
        );

        let err = UserError::FromSqlPlaceholderOutOfRange { index: 2, count: 1 };
        assert_eq!(
            err.to_string(),
            "Raw SQL placeholder {2} is out of range: 1 argument(s) supplied."
        );

        let err = UserError::InvalidFromSqlArguments {
            expression_type: "Constant",
            value_type: Some("Int64".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Raw SQL arguments must be a parameter or constant holding an array, but got a Constant with value type 'Int64'."
        );
    }

    #[test]
    fn test_error_classes() {
        let user: QueryError = UserError::OffsetRequiresLimit.into();
        assert!(user.is_user_error());
        assert!(!user.is_internal());

        let internal: QueryError = InternalError::JoinsNotSupported.into();
        assert!(internal.is_internal());
        assert_eq!(
            internal.to_string(),
            "Internal error (invalid IR): JOINs not yet supported"
        );

        let lookup: QueryError = RegistryError::MappingNotFound(cosql_ir::DataType::Unknown).into();
        assert!(lookup.is_internal());
        assert_eq!(
            lookup.to_string(),
            "Internal error (invalid IR): Type mapping lookup failed: No type mapping found for type Unknown"
        );
    }
}
