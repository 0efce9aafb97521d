//! Error types for the Stockroom engine.

use crate::RecordId;
use thiserror::Error;

/// All possible errors from the Stockroom engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Record errors
    #[error("record has no id")]
    MissingId,

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("record not in view: {0}")]
    RecordNotInView(RecordId),

    // Realtime frame errors
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    // Edit cell errors
    #[error("field '{0}' is not editable for this record")]
    NotEditable(String),

    #[error("cell is not being edited")]
    NotEditing,

    #[error("validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    // Query errors
    #[error("invalid page: {0} (pages start at 1)")]
    InvalidPage(u32),

    #[error("invalid query string: {0}")]
    QueryString(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::RecordNotInView(RecordId::Int(7));
        assert_eq!(err.to_string(), "record not in view: 7");

        let err = Error::Validation {
            field: "number".into(),
            message: "Number is required".into(),
        };
        assert_eq!(
            err.to_string(),
            "validation failed for 'number': Number is required"
        );

        let err = Error::InvalidPage(0);
        assert_eq!(err.to_string(), "invalid page: 0 (pages start at 1)");
    }
}
