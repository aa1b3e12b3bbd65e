//! Wire model for parsed authentication log records.
//!
//! A [`LogEntry`] is what the ingestion pipeline ships to Quickwit: one JSON
//! object per log line, with all optional fields omitted when absent so the
//! document mapper never sees empty strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The message categories recognised in relay log lines.
///
/// Detection is a substring match against the raw message text, tried in the
/// order the variants are declared; anything unmatched is [`MessageKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "Access-Accept")]
    AccessAccept,
    #[serde(rename = "Access-Reject")]
    AccessReject,
    #[serde(rename = "Access-Challenge")]
    AccessChallenge,
    #[serde(rename = "Accounting-Request")]
    AccountingRequest,
    #[serde(rename = "Accounting-Response")]
    AccountingResponse,
    /// A `last message repeated N times` suppression line.
    #[serde(rename = "repeat")]
    Repeat,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl MessageKind {
    const MATCH_ORDER: [(&'static str, MessageKind); 5] = [
        ("Access-Accept", MessageKind::AccessAccept),
        ("Access-Reject", MessageKind::AccessReject),
        ("Access-Challenge", MessageKind::AccessChallenge),
        ("Accounting-Request", MessageKind::AccountingRequest),
        ("Accounting-Response", MessageKind::AccountingResponse),
    ];

    /// Classify a message body by substring match, in declared order.
    pub fn detect(message: &str) -> MessageKind {
        for (needle, kind) in MessageKind::MATCH_ORDER {
            if message.contains(needle) {
                return kind;
            }
        }
        MessageKind::Unknown
    }

    /// Whether this is one of the `Access-*` authentication outcomes that
    /// carries user/station/realm fields.
    pub fn is_access(&self) -> bool {
        matches!(
            self,
            MessageKind::AccessAccept | MessageKind::AccessReject | MessageKind::AccessChallenge
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::AccessAccept => "Access-Accept",
            MessageKind::AccessReject => "Access-Reject",
            MessageKind::AccessChallenge => "Access-Challenge",
            MessageKind::AccountingRequest => "Accounting-Request",
            MessageKind::AccountingResponse => "Accounting-Response",
            MessageKind::Repeat => "repeat",
            MessageKind::Unknown => "Unknown",
        }
    }
}

/// One parsed log line, ready for NDJSON ingest.
///
/// `timestamp` and `message_type` are always present; every other field except
/// `hostname`, `process`, and `full_message` is optional and skipped on the
/// wire when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// UTC-normalised event time, second precision.
    pub timestamp: DateTime<Utc>,

    pub hostname: String,

    /// Emitting process name; `system` for repeat-suppression lines.
    pub process: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pid: Option<i64>,

    pub message_type: MessageKind,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub destination_ip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub station_id: Option<String>,

    /// IdP-side domain (the `from` marker).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub realm: Option<String>,

    /// SP-side domain (the `to` marker).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_provider: Option<String>,

    /// Suppression count from `last message repeated N times`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub repeat_count: Option<u32>,

    /// The source line, verbatim.
    pub full_message: String,
}

impl LogEntry {
    /// A minimal entry carrying only the always-present fields.
    pub fn new(
        timestamp: DateTime<Utc>,
        hostname: impl Into<String>,
        process: impl Into<String>,
        message_type: MessageKind,
        full_message: impl Into<String>,
    ) -> Self {
        LogEntry {
            timestamp,
            hostname: hostname.into(),
            process: process.into(),
            pid: None,
            message_type,
            destination_ip: None,
            username: None,
            station_id: None,
            realm: None,
            service_provider: None,
            repeat_count: None,
            full_message: full_message.into(),
        }
    }
}
