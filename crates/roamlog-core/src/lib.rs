//! Shared model and parsing for the roamlog tools.
//!
//! This crate holds what the ingestion daemon and the query tools have in
//! common:
//!
//! - [`LogEntry`] / [`MessageKind`] - the wire model shipped to Quickwit
//! - [`parse_line`] - the plaintext relay log line parser
//! - [`Properties`] / [`IngestSettings`] / [`QuickwitAuth`] - configuration
//!
//! # Data flow
//!
//! ```text
//! relay log file → parse_line → LogEntry → NDJSON ingest → Quickwit index
//!                                                              │
//!                       aggregation queries (roamlog-query) ←──┘
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod parser;

pub use config::{IngestSettings, Properties, QuickwitAuth, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES};
pub use entry::{LogEntry, MessageKind};
pub use error::{Error, Result};
pub use parser::{parse_line, parse_line_at};

/// The Quickwit index the federation relay logs live in.
pub const INDEX_ID: &str = "nro-logs";

/// Build the NDJSON ingest endpoint for a Quickwit base URL.
pub fn ingest_url(base: &str) -> String {
    format!("{}/api/v1/{}/ingest", base.trim_end_matches('/'), INDEX_ID)
}

/// Build the search endpoint for a Quickwit base URL.
pub fn search_url(base: &str) -> String {
    format!("{}/api/v1/{}/search", base.trim_end_matches('/'), INDEX_ID)
}

/// Build the Prometheus metrics endpoint for a Quickwit base URL.
pub fn metrics_url(base: &str) -> String {
    format!("{}/metrics", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_tolerate_trailing_slash() {
        assert_eq!(
            ingest_url("http://qw:7280/"),
            "http://qw:7280/api/v1/nro-logs/ingest"
        );
        assert_eq!(
            search_url("http://qw:7280"),
            "http://qw:7280/api/v1/nro-logs/search"
        );
        assert_eq!(metrics_url("http://qw:7280/"), "http://qw:7280/metrics");
    }
}
