//! Row-level schema violations raised at the store and file boundaries.
//!
//! Every variant is fatal for the stage that hits it: rows are never coerced
//! into shape or silently skipped.

/// A source row that does not fit its typed schema.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("row {row}: required column '{column}' is missing or empty")]
    MissingValue { row: usize, column: &'static str },

    #[error("row {row}: column '{column}' has unparseable timestamp '{value}'")]
    BadTimestamp {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column '{column}' has unparseable boolean '{value}'")]
    BadBoolean {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column '{column}' has unparseable integer '{value}'")]
    BadInteger {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column '{column}' must not be negative, got {value}")]
    NegativeAmount {
        row: usize,
        column: &'static str,
        value: i64,
    },

    #[error("row {row}: status code must be a single character, got '{value}'")]
    BadStatus { row: usize, value: String },

    #[error("route code '{0}' appears more than once in the route reference")]
    DuplicateRoute(String),
}
