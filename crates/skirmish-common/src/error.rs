//! Error types shared across Skirmish crates.

use thiserror::Error;

use crate::version::SchemaVersion;

/// Top-level error type for Skirmish setup operations.
///
/// The per-tick combat API never produces these; they surface only while
/// loading data or wiring a simulation together.
#[derive(Debug, Error)]
pub enum SkirmishError {
    /// Data table errors
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: SchemaVersion,
        /// Actual version found
        actual: SchemaVersion,
    },
}

/// Errors in externally supplied tuning data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    /// A numeric field is outside its legal range
    #[error("{record}: field `{field}` out of range ({value})")]
    OutOfRange {
        /// Record name (archetype or weapon)
        record: String,
        /// Field name
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// A required text field is empty
    #[error("{record}: field `{field}` must not be empty")]
    Empty {
        /// Record name
        record: String,
        /// Field name
        field: &'static str,
    },

    /// Version string could not be parsed
    #[error("invalid version string `{0}`")]
    BadVersion(String),
}

/// Result type alias for Skirmish setup operations.
pub type SkirmishResult<T> = Result<T, SkirmishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = DataError::OutOfRange {
            record: "rogue".to_string(),
            field: "max_health",
            value: -1.0,
        };
        assert_eq!(err.to_string(), "rogue: field `max_health` out of range (-1)");
    }

    #[test]
    fn test_data_error_converts() {
        let err: SkirmishError = DataError::BadVersion("x".to_string()).into();
        assert!(matches!(err, SkirmishError::Data(_)));
    }
}
