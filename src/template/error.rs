//! Template engine error types

use thiserror::Error;

/// Errors raised while parsing or rendering template strings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The variable part of a token is not a key, dotted path or bracket path
    #[error("Could not parse variable: {0}")]
    InvalidVariable(String),

    /// A key is missing in the data
    #[error("Key not found in data: {0}")]
    KeyNotFound(String),

    /// A numeric key points past the end of a list
    #[error("Key not found in list: {0}")]
    IndexOutOfRange(String),

    /// No filter with this name is registered
    #[error("Filter {0} not found.")]
    UnknownFilter(String),

    #[error("Filter {filter} requires option {option}.")]
    MissingOption { filter: String, option: String },

    #[error("Filter {filter} does not allow attribute {option}.")]
    UnexpectedOption { filter: String, option: String },

    #[error("Filter {filter} could not process value: {message}")]
    InvalidValue { filter: String, message: String },
}
