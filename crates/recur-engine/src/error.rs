//! Error types for recur-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurError {
    #[error("Invalid {field}: {value} (must be {range})")]
    InvalidField {
        field: &'static str,
        value: i32,
        range: String,
    },

    #[error("Invalid interval: {0} (must be greater than 0)")]
    InvalidInterval(i32),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported property: {0}")]
    UnsupportedProperty(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),
}

pub type Result<T> = std::result::Result<T, RecurError>;
