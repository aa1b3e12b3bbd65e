//! Log line parser.
//!
//! Turns one plaintext relay log line into a [`LogEntry`]. The parser is a
//! pure function: callers decide what to do with failures (the ingestion
//! pipeline logs and skips them). It must never panic, however short or
//! mangled the input.

use crate::entry::{LogEntry, MessageKind};
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Parse a single log line into a [`LogEntry`].
///
/// The legacy syslog timestamp form has no year, so it is resolved against
/// the current wall clock; see [`parse_line_at`] for a pinned clock.
pub fn parse_line(line: &str) -> Result<LogEntry> {
    parse_line_at(line, Utc::now())
}

/// [`parse_line`] with an explicit "now" for the implied-year rule.
pub fn parse_line_at(line: &str, now: DateTime<Utc>) -> Result<LogEntry> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(Error::Parse("not enough fields".to_string()));
    }

    let (timestamp, consumed) = parse_timestamp_prefix(&tokens, now)?;

    let hostname = match tokens.get(consumed) {
        Some(host) => *host,
        None => return Err(Error::Parse("missing hostname".to_string())),
    };
    let rest = &tokens[consumed + 1..];
    if rest.is_empty() {
        return Err(Error::Parse("not enough fields".to_string()));
    }

    // Suppression lines replace the process field entirely.
    if rest.len() >= 3 && rest[0] == "last" && rest[1] == "message" && rest[2] == "repeated" {
        let mut entry = LogEntry::new(timestamp, hostname, "system", MessageKind::Repeat, line);
        if rest.last() == Some(&"times") && rest.len() >= 2 {
            entry.repeat_count = rest[rest.len() - 2].parse().ok();
        }
        return Ok(entry);
    }

    let (process, pid) = split_process_pid(rest[0]);
    let message = rest[1..].join(" ");
    let kind = MessageKind::detect(&message);

    let mut entry = LogEntry::new(timestamp, hostname, process, kind, line);
    entry.pid = pid;

    if kind.is_access() {
        extract_access_fields(&mut entry, &rest[1..]);
    }

    Ok(entry)
}

/// Recognise the timestamp prefix and report how many tokens it consumed.
///
/// Layouts, in precedence order: ISO8601 (`T` separator, optional offset),
/// space-separated date-time, date only, legacy syslog `Mon DD HH:MM:SS`.
/// Naive forms are taken as UTC.
fn parse_timestamp_prefix(tokens: &[&str], now: DateTime<Utc>) -> Result<(DateTime<Utc>, usize)> {
    let first = tokens[0];

    if first.len() >= 19 && first.as_bytes().get(10) == Some(&b'T') {
        if let Ok(stamp) = DateTime::parse_from_rfc3339(first) {
            return Ok((stamp.with_timezone(&Utc), 1));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(first, "%Y-%m-%dT%H:%M:%S") {
            return Ok((Utc.from_utc_datetime(&naive), 1));
        }
    }

    if tokens.len() >= 2 {
        let joined = format!("{} {}", tokens[0], tokens[1]);
        if let Ok(naive) = NaiveDateTime::parse_from_str(&joined, "%Y-%m-%d %H:%M:%S") {
            return Ok((Utc.from_utc_datetime(&naive), 2));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(first, "%Y-%m-%d") {
        return Ok((Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)), 1));
    }

    if tokens.len() >= 3 {
        let joined = format!("{} {} {} {}", tokens[0], tokens[1], tokens[2], now.year());
        if let Ok(naive) = NaiveDateTime::parse_from_str(&joined, "%b %d %H:%M:%S %Y") {
            let mut stamp = Utc.from_utc_datetime(&naive);
            // A December line read in early January belongs to the year that
            // just ended.
            if stamp > now && stamp.month() == 12 {
                stamp = stamp
                    .with_year(stamp.year() - 1)
                    .ok_or_else(|| Error::Timestamp(joined.clone()))?;
            }
            return Ok((stamp, 3));
        }
    }

    Err(Error::Timestamp(first.to_string()))
}

/// Split a `process[pid]` token; absent brackets leave the pid unset.
fn split_process_pid(token: &str) -> (&str, Option<i64>) {
    if let (Some(open), Some(close)) = (token.find('['), token.find(']')) {
        if close > open {
            let pid = token[open + 1..close].parse::<i64>().ok();
            return (&token[..open], pid);
        }
    }
    (token.trim_end_matches(':'), None)
}

/// Scan an Access-* message for the `user`, `stationid`, `from`, and `to`
/// field markers, capturing the token that follows each.
///
/// `user`, `stationid`, and `from` keep the first occurrence; `to` keeps the
/// last, and a parenthesised token right after its value is the destination
/// IP. A marker at end-of-line simply leaves the field unset.
fn extract_access_fields(entry: &mut LogEntry, tokens: &[&str]) {
    for (i, token) in tokens.iter().enumerate() {
        match *token {
            "user" => {
                if entry.username.is_none() {
                    entry.username = marker_value(tokens, i);
                }
            }
            "stationid" => {
                if entry.station_id.is_none() {
                    entry.station_id = marker_value(tokens, i);
                }
            }
            "from" => {
                if entry.realm.is_none() {
                    entry.realm = marker_value(tokens, i);
                }
            }
            "to" => {
                if let Some(value) = marker_value(tokens, i) {
                    entry.service_provider = Some(value);
                    entry.destination_ip = tokens.get(i + 2).and_then(|t| paren_value(t));
                }
            }
            _ => {}
        }
    }
}

/// The token following a marker, cleaned of trailing punctuation.
fn marker_value(tokens: &[&str], marker_idx: usize) -> Option<String> {
    tokens
        .get(marker_idx + 1)
        .map(|t| clean_token(t).to_string())
        .filter(|v| !v.is_empty())
}

fn clean_token(token: &str) -> &str {
    token.trim_end_matches([',', '.', ';', ':'])
}

/// The inside of a `(...)` token, if the token is one.
fn paren_value(token: &str) -> Option<String> {
    let token = clean_token(token);
    let inner = token.strip_prefix('(')?;
    let inner = inner.strip_suffix(')').unwrap_or(inner);
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}
