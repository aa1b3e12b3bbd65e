//! Quickwit NDJSON ingest transport.
//!
//! A batch is serialised as one JSON object per line and POSTed to the ingest
//! endpoint with HTTP Basic auth. Delivery is retried with exponential
//! backoff; a payload-too-large rejection splits the working slice in half
//! and delivers both halves, so the halving logic itself never drops an
//! entry. The only loss path is retry exhaustion.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use roamlog_core::{ingest_url, IngestSettings, LogEntry};
use std::time::Duration;
use tracing::{info, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Quickwit ingest endpoint.
#[derive(Debug, Clone)]
pub struct IngestClient {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    max_retries: u32,
}

impl IngestClient {
    pub fn new(settings: &IngestSettings) -> Result<IngestClient> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(IngestClient {
            http,
            endpoint: ingest_url(&settings.quickwit_url),
            username: settings.username.clone(),
            password: settings.password.clone(),
            max_retries: settings.max_retries.max(1),
        })
    }

    /// Deliver a batch, splitting on payload-too-large rejections.
    ///
    /// Slices are processed depth-first so entries still reach the server in
    /// source order. Returns the number of entries delivered.
    pub async fn send(&self, entries: &[LogEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0usize;
        // LIFO work stack of index ranges; pushing the tail half first keeps
        // delivery in source order.
        let mut pending: Vec<(usize, usize)> = vec![(0, entries.len())];

        while let Some((lo, hi)) = pending.pop() {
            match self.deliver_slice(&entries[lo..hi]).await {
                Ok(()) => {
                    delivered += hi - lo;
                }
                Err(Error::PayloadTooLarge) => {
                    let mid = lo + (hi - lo) / 2;
                    if mid == lo {
                        return Err(Error::BatchUnderflow);
                    }
                    warn!(
                        "payload too large for {} entries, splitting into {} + {}",
                        hi - lo,
                        mid - lo,
                        hi - mid
                    );
                    pending.push((mid, hi));
                    pending.push((lo, mid));
                }
                Err(err) => return Err(err),
            }
        }

        info!("delivered {delivered} entries to {}", self.endpoint);
        Ok(delivered)
    }

    /// One slice, up to `max_retries` attempts with `2^attempt`-second
    /// backoff. A payload-too-large rejection is surfaced immediately so the
    /// caller can split instead of burning attempts.
    async fn deliver_slice(&self, entries: &[LogEntry]) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.post(entries).await {
                Ok(()) => return Ok(()),
                Err(Error::PayloadTooLarge) => return Err(Error::PayloadTooLarge),
                Err(err) => {
                    attempt += 1;
                    warn!("attempt {attempt} failed: {err}");
                    if attempt >= self.max_retries {
                        return Err(Error::RetriesExhausted { attempts: attempt });
                    }
                    tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
                }
            }
        }
    }

    async fn post(&self, entries: &[LogEntry]) -> Result<()> {
        let body = ndjson_body(entries)?;
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::PAYLOAD_TOO_LARGE || body.contains("Payload Too Large") {
            return Err(Error::PayloadTooLarge);
        }
        Err(Error::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Serialise entries as newline-delimited JSON: exactly one object plus one
/// `\n` per entry, nothing else.
fn ndjson_body(entries: &[LogEntry]) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(entries.len() * 256);
    for entry in entries {
        serde_json::to_writer(&mut body, entry)
            .map_err(|e| Error::Core(roamlog_core::Error::Json(e)))?;
        body.push(b'\n');
    }
    Ok(body)
}
