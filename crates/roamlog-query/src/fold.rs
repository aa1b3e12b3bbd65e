//! Bucket-tree folding.
//!
//! The search response is a dynamically-typed JSON tree. Folding walks the
//! expected aggregation shape and flattens every non-empty date-histogram
//! leaf into a synthetic [`AuthEvent`]. Missing *required* paths (the
//! `aggregations` object and the top-level aggregation) fail the job.
//! Anything malformed below that (a non-object bucket, a missing key, a
//! zero-`doc_count` histogram bucket) skips just that bucket.

use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

/// One flattened aggregation leaf: who authenticated, against what, when.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub username: String,
    pub realm: Option<String>,
    pub service_provider: Option<String>,
    pub station_id: Option<String>,

    /// Histogram bucket key converted to a second-precision instant.
    pub timestamp: DateTime<Utc>,
}

/// Fold an accept-by-realm response: `unique_users` → (`providers` ×
/// `daily`). Returns the flattened events and the sum of per-user document
/// counts (the job's hit contribution).
pub fn fold_realm(response: &Value) -> Result<(Vec<AuthEvent>, u64)> {
    let buckets = required_buckets(response, "unique_users")?;

    let mut events = Vec::new();
    let mut hits = 0u64;

    for bucket in buckets {
        let Some(username) = bucket_key(bucket) else {
            debug!("skipping unique_users bucket without a string key");
            continue;
        };
        hits += doc_count(bucket);

        let providers: Vec<&str> = sub_buckets(bucket, "providers")
            .into_iter()
            .filter_map(bucket_key)
            .collect();

        for daily in sub_buckets(bucket, "daily") {
            let Some(timestamp) = histogram_instant(daily) else {
                continue;
            };
            for provider in &providers {
                events.push(AuthEvent {
                    username: username.to_string(),
                    realm: None,
                    service_provider: Some(provider.to_string()),
                    station_id: None,
                    timestamp,
                });
            }
        }
    }

    Ok((events, hits))
}

/// Fold an accept-by-SP response: `by_station` → `by_user` → (`by_realm` ×
/// `auth_times`). Returns the flattened events and the sum of per-station
/// document counts.
pub fn fold_stations(response: &Value) -> Result<(Vec<AuthEvent>, u64)> {
    let buckets = required_buckets(response, "by_station")?;

    let mut events = Vec::new();
    let mut hits = 0u64;

    for station_bucket in buckets {
        let Some(station_id) = bucket_key(station_bucket) else {
            debug!("skipping by_station bucket without a string key");
            continue;
        };
        hits += doc_count(station_bucket);

        for user_bucket in sub_buckets(station_bucket, "by_user") {
            let Some(username) = bucket_key(user_bucket) else {
                continue;
            };
            // The realm terms are capped at size 10 but a user's auths from
            // one device carry one realm; the first bucket is taken.
            let Some(realm) = sub_buckets(user_bucket, "by_realm")
                .first()
                .and_then(|b| bucket_key(b))
            else {
                continue;
            };

            for leaf in sub_buckets(user_bucket, "auth_times") {
                let Some(timestamp) = histogram_instant(leaf) else {
                    continue;
                };
                events.push(AuthEvent {
                    username: username.to_string(),
                    realm: Some(realm.to_string()),
                    service_provider: None,
                    station_id: Some(station_id.to_string()),
                    timestamp,
                });
            }
        }
    }

    Ok((events, hits))
}

/// The bucket array of a top-level aggregation; its absence is fatal.
fn required_buckets<'a>(response: &'a Value, name: &str) -> Result<&'a Vec<Value>> {
    let aggs = response
        .get("aggregations")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Shape("no aggregations in response".to_string()))?;
    let agg = aggs
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Shape(format!("no {name} aggregation")))?;
    agg.get("buckets")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Shape(format!("no buckets in {name} aggregation")))
}

/// The bucket array of an optional sub-aggregation; anything missing or
/// mistyped is just an empty list.
fn sub_buckets<'a>(bucket: &'a Value, name: &str) -> &'a [Value] {
    bucket
        .get(name)
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn bucket_key(bucket: &Value) -> Option<&str> {
    bucket.get("key").and_then(Value::as_str)
}

fn doc_count(bucket: &Value) -> u64 {
    bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0)
}

/// A date-histogram leaf's instant: millisecond key to whole seconds.
/// Empty buckets (`doc_count` 0) yield nothing.
fn histogram_instant(bucket: &Value) -> Option<DateTime<Utc>> {
    if doc_count(bucket) == 0 {
        return None;
    }
    let millis = bucket.get("key").and_then(Value::as_f64)?;
    Utc.timestamp_opt((millis / 1000.0) as i64, 0).single()
}
