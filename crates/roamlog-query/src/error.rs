//! Error types for the query tools.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while querying and aggregating.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error from the shared core.
    #[error(transparent)]
    Core(#[from] roamlog_core::Error),

    /// A command-line argument was out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Quickwit answered with a non-200 status.
    #[error("quickwit error (status {status}): {body}")]
    Status { status: u16, body: String },

    /// The response carried an `error` field.
    #[error("quickwit error: {0}")]
    Quickwit(String),

    /// A required aggregation path was missing from the response.
    #[error("unexpected response structure: {0}")]
    Shape(String),

    /// The merger task terminated abnormally.
    #[error("merge task failed: {0}")]
    Merge(String),

    /// I/O error (output file or directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
