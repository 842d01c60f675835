//! Search error types

use thiserror::Error;

use crate::models::ApiType;

/// Errors raised while composing a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The backend has no implementation for this kind of query
    #[error("{operation} queries are not supported by the {api_type} backend")]
    Unsupported {
        api_type: ApiType,
        operation: &'static str,
    },

    #[error("Field {0} does not exist.")]
    UnknownField(String),

    /// User input could not be converted to the field's data type
    #[error("Invalid value for field {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Search configuration not found: {0}")]
    UnknownSearch(String),

    #[error("API configuration not found: {0}")]
    UnknownApi(String),
}

impl SearchError {
    pub fn unsupported(api_type: ApiType, operation: &'static str) -> Self {
        Self::Unsupported {
            api_type,
            operation,
        }
    }

    pub fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
