//! Quickwit indexer statistics polling.
//!
//! HTTP 200 on ingest only means the transport accepted the payload; whether
//! the document mapper liked the entries shows up later in Quickwit's own
//! Prometheus counters. A background task polls the `/metrics` endpoint once
//! a minute and logs the per-index document counters.

use crate::error::Result;
use reqwest::StatusCode;
use roamlog_core::{metrics_url, IngestSettings, INDEX_ID};
use std::time::Duration;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const PROCESSED_DOCS_METRIC: &str = "quickwit_indexing_processed_docs_total";

/// Document counters reported by the Quickwit indexer for one index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerStats {
    /// Documents accepted by the doc mapper.
    pub valid_docs: i64,

    /// Documents rejected by the doc mapper.
    pub error_docs: i64,

    /// Documents that were not valid JSON at all.
    pub parse_errors: i64,
}

/// Periodic poller for the indexer counters.
#[derive(Debug, Clone)]
pub struct StatsPoller {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl StatsPoller {
    pub fn new(settings: &IngestSettings) -> Result<StatsPoller> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(StatsPoller {
            http,
            endpoint: metrics_url(&settings.quickwit_url),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    /// Poll forever, logging the counters once a minute. Failed polls are
    /// logged and skipped.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.fetch().await {
                Ok(stats) => {
                    info!("Quickwit indexing stats for {INDEX_ID}:");
                    info!("  valid documents: {}", stats.valid_docs);
                    info!("  error documents: {}", stats.error_docs);
                    info!("  parse errors: {}", stats.parse_errors);
                }
                Err(err) => warn!("failed to fetch indexing stats: {err}"),
            }
        }
    }

    /// One metrics fetch.
    pub async fn fetch(&self) -> Result<IndexerStats> {
        let response = self
            .http
            .get(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(crate::error::Error::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parse_indexer_stats(&body, INDEX_ID))
    }
}

/// Extract the per-index document counters from Prometheus exposition text.
///
/// Lines that do not carry the expected metric name, index label, and a
/// numeric value are ignored.
pub fn parse_indexer_stats(text: &str, index: &str) -> IndexerStats {
    let index_label = format!("index=\"{index}\"");
    let mut stats = IndexerStats::default();

    for line in text.lines() {
        if !line.contains(PROCESSED_DOCS_METRIC) || !line.contains(&index_label) {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(_labels), Some(raw_value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(value) = raw_value.parse::<i64>() else {
            continue;
        };

        if line.contains("docs_processed_status=\"valid\"") {
            stats.valid_docs = value;
        } else if line.contains("docs_processed_status=\"doc_mapper_error\"") {
            stats.error_docs = value;
        } else if line.contains("docs_processed_status=\"json_parse_error\"") {
            stats.parse_errors = value;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use roamlog_core::Properties;

    const SAMPLE: &str = "\
# HELP quickwit_indexing_processed_docs_total Number of processed docs by index and status\n\
# TYPE quickwit_indexing_processed_docs_total counter\n\
quickwit_indexing_processed_docs_total{docs_processed_status=\"valid\",index=\"nro-logs\"} 123456\n\
quickwit_indexing_processed_docs_total{docs_processed_status=\"doc_mapper_error\",index=\"nro-logs\"} 42\n\
quickwit_indexing_processed_docs_total{docs_processed_status=\"json_parse_error\",index=\"nro-logs\"} 7\n\
quickwit_indexing_processed_docs_total{docs_processed_status=\"valid\",index=\"other\"} 999\n\
quickwit_indexing_splits_total{index=\"nro-logs\"} 3\n";

    #[test]
    fn parses_all_three_counters() {
        let stats = parse_indexer_stats(SAMPLE, "nro-logs");
        assert_eq!(
            stats,
            IndexerStats {
                valid_docs: 123_456,
                error_docs: 42,
                parse_errors: 7,
            }
        );
    }

    #[test]
    fn ignores_other_indexes() {
        let stats = parse_indexer_stats(SAMPLE, "other");
        assert_eq!(stats.valid_docs, 999);
        assert_eq!(stats.error_docs, 0);
        assert_eq!(stats.parse_errors, 0);
    }

    #[test]
    fn tolerates_garbage_lines() {
        let text = "quickwit_indexing_processed_docs_total{index=\"nro-logs\",docs_processed_status=\"valid\"} not-a-number\n\
                    quickwit_indexing_processed_docs_total{index=\"nro-logs\"}\n";
        let stats = parse_indexer_stats(text, "nro-logs");
        assert_eq!(stats, IndexerStats::default());
    }

    #[test]
    fn empty_exposition_yields_zeroes() {
        assert_eq!(parse_indexer_stats("", "nro-logs"), IndexerStats::default());
    }

    fn settings(url: &str) -> roamlog_core::IngestSettings {
        let mut props =
            Properties::parse("logFilePath=/l\nusername=ingest\npassword=pw\n");
        props.set("quickwitURL", url);
        roamlog_core::IngestSettings::from_properties(&props).unwrap()
    }

    #[tokio::test]
    async fn fetch_hits_metrics_endpoint_with_auth() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/metrics")
                .header("authorization", "Basic aW5nZXN0OnB3");
            then.status(200).body(SAMPLE);
        });

        let poller = StatsPoller::new(&settings(&server.base_url())).unwrap();
        let stats = poller.fetch().await.unwrap();
        assert_eq!(stats.valid_docs, 123_456);
        mock.assert();
    }

    #[tokio::test]
    async fn fetch_surfaces_non_200() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/metrics");
            then.status(403).body("forbidden");
        });

        let poller = StatsPoller::new(&settings(&server.base_url())).unwrap();
        let err = poller.fetch().await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
