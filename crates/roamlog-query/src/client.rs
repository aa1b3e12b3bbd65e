//! Quickwit aggregation-query client.
//!
//! One POST per [`Job`] against the search endpoint, `max_hits: 0` always:
//! the interesting part of the response is the aggregation bucket tree, hits
//! are never materialised.

use crate::error::{Error, Result};
use crate::window::Job;
use roamlog_core::{search_url, QuickwitAuth};
use serde_json::{json, Value};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Quickwit search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl SearchClient {
    pub fn new(auth: &QuickwitAuth) -> Result<SearchClient> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(SearchClient {
            http,
            endpoint: search_url(&auth.url),
            username: auth.user.clone(),
            password: auth.pass.clone(),
        })
    }

    /// Run one aggregation query for one job.
    ///
    /// Fails on a non-200 status or an `error` field in the response body;
    /// the decoded response is otherwise returned as-is for folding.
    pub async fn search(&self, query: &str, job: Job, aggs: &Value) -> Result<Value> {
        let body = json!({
            "query": query,
            "start_timestamp": job.start_ts,
            "end_timestamp": job.end_ts,
            "max_hits": 0,
            "aggs": aggs,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status != reqwest::StatusCode::OK {
            return Err(Error::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let decoded: Value = serde_json::from_str(&text)?;
        if let Some(err) = decoded.get("error") {
            let message = err
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(Error::Quickwit(message));
        }

        Ok(decoded)
    }
}

/// The accept-by-realm aggregation shape: users, each with their service
/// providers and a daily activity histogram.
pub fn realm_aggs() -> Value {
    json!({
        "unique_users": {
            "terms": { "field": "username", "size": 10000 },
            "aggs": {
                "providers": {
                    "terms": { "field": "service_provider", "size": 1000 }
                },
                "daily": {
                    "date_histogram": { "field": "timestamp", "fixed_interval": "86400s" }
                }
            }
        }
    })
}

/// The accept-by-SP aggregation shape: stations, each with their users, the
/// users' realms, and a minute-resolution authentication histogram.
pub fn station_aggs() -> Value {
    json!({
        "by_station": {
            "terms": { "field": "station_id", "size": 1000 },
            "aggs": {
                "by_user": {
                    "terms": { "field": "username", "size": 100 },
                    "aggs": {
                        "by_realm": {
                            "terms": { "field": "realm", "size": 10 }
                        },
                        "auth_times": {
                            "date_histogram": { "field": "timestamp", "fixed_interval": "1m" }
                        }
                    }
                }
            }
        }
    })
}

/// The realm tool's free-text predicate.
pub fn realm_query(domain: &str) -> String {
    format!(r#"message_type:"Access-Accept" AND realm:"{domain}" NOT service_provider:"client""#)
}

/// The SP tool's free-text predicate.
pub fn sp_query(service_provider: &str) -> String {
    format!(r#"message_type:"Access-Accept" AND service_provider:"{service_provider}""#)
}
