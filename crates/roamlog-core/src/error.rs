//! Error types shared across the roamlog crates.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing log lines or loading configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// A log line did not have the expected structure.
    #[error("invalid log format: {0}")]
    Parse(String),

    /// A timestamp prefix could not be interpreted by any known layout.
    #[error("unable to parse timestamp: {0}")]
    Timestamp(String),

    /// A required configuration key is missing or a value is malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = Error::Parse("not enough fields".to_string());
        let msg = err.to_string();
        assert!(msg.contains("invalid log format"));
        assert!(msg.contains("not enough fields"));
    }

    #[test]
    fn timestamp_error_display() {
        let err = Error::Timestamp("2024-13-40".to_string());
        assert!(err.to_string().contains("unable to parse timestamp"));
    }

    #[test]
    fn config_error_display() {
        let err = Error::Config("missing required key quickwitURL".to_string());
        let msg = err.to_string();
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("quickwitURL"));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
