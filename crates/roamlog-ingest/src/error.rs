//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tailing and shipping log entries.
#[derive(Error, Debug)]
pub enum Error {
    /// Parsing or configuration error from the shared core.
    #[error(transparent)]
    Core(#[from] roamlog_core::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem watcher error.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server rejected the payload as too large (HTTP 413 or the
    /// equivalent body phrase); the batch must be split.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Any non-200 ingest response that is not a payload-size rejection.
    #[error("ingest rejected: status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// A batch slice could not be delivered within the retry budget.
    #[error("failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Halving a batch reached zero entries without the server accepting it.
    #[error("batch size reduced to zero")]
    BatchUnderflow,
}
