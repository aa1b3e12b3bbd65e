//! Device usage pattern analysis.
//!
//! Pure, deterministic functions over a sequence of authentication
//! timestamps. Input order does not matter: every function sorts its own
//! working copy, so results are stable under any permutation of equal
//! inputs.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Minutes of silence that split two sessions or active periods.
const SESSION_GAP_MINUTES: f64 = 15.0;

/// Maximum minutes between auths inside a frequent-reauth run.
const REAUTH_INTERVAL_MINUTES: f64 = 2.0;

/// Minimum run length that counts as frequent reauthentication.
const REAUTH_MIN_COUNT: usize = 3;

/// Minutes of silence that get flagged as a long gap.
const LONG_GAP_MINUTES: i64 = 60;

/// A contiguous time period in a device's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_count: Option<u32>,
}

/// Statistics over the gaps between consecutive authentications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthIntervals {
    pub average_minutes: f64,
    pub min_minutes: i64,
    pub max_minutes: i64,
}

/// A run of abnormally frequent re-authentications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequentReauth {
    pub period: String,
    pub count: u32,
    pub interval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionStability {
    pub frequent_reauths: Vec<FrequentReauth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longest_gap: Option<Period>,
}

/// Full usage-pattern analysis for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsagePattern {
    pub hourly_distribution: BTreeMap<String, u32>,
    pub auth_intervals: AuthIntervals,
    pub active_periods: Vec<Period>,
    pub connection_stability: ConnectionStability,
}

/// One usage session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub start: String,
    pub end: String,
    pub duration: String,
    pub auths_count: u32,
    pub reauth_rate: String,
}

/// Session-level analysis for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAnalysis {
    pub total_sessions: u32,
    pub average_session_duration: String,
    pub session_details: Vec<Session>,
}

/// A rule-derived connection issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PotentialIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub period: String,
    pub description: String,
}

/// Analyse a device's authentication timestamps. Empty input yields nothing.
pub fn usage_patterns(timestamps: &[DateTime<Utc>]) -> Option<UsagePattern> {
    if timestamps.is_empty() {
        return None;
    }
    let ts = sorted(timestamps);

    let mut hourly: BTreeMap<String, u32> = BTreeMap::new();
    for stamp in &ts {
        let hour = stamp.hour();
        *hourly
            .entry(format!("{hour:02}:00-{hour:02}:59"))
            .or_default() += 1;
    }

    let intervals: Vec<f64> = ts
        .windows(2)
        .map(|pair| minutes_between(pair[0], pair[1]))
        .collect();
    let auth_intervals = if intervals.is_empty() {
        AuthIntervals::default()
    } else {
        let sum: f64 = intervals.iter().sum();
        let min = intervals.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = intervals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        AuthIntervals {
            average_minutes: sum / intervals.len() as f64,
            min_minutes: min as i64,
            max_minutes: max as i64,
        }
    };

    Some(UsagePattern {
        hourly_distribution: hourly,
        auth_intervals,
        active_periods: active_periods_sorted(&ts),
        connection_stability: ConnectionStability {
            frequent_reauths: frequent_reauths_sorted(&ts),
            longest_gap: longest_gap_sorted(&ts),
        },
    })
}

/// Split timestamps into usage sessions on gaps above 15 minutes.
/// Needs at least two points.
pub fn session_analysis(timestamps: &[DateTime<Utc>]) -> Option<SessionAnalysis> {
    if timestamps.len() < 2 {
        return None;
    }
    let ts = sorted(timestamps);

    let mut sessions = Vec::new();
    let mut durations = Vec::new();
    let mut start = ts[0];
    let mut last = ts[0];
    let mut auths = 1u32;

    for &stamp in &ts[1..] {
        if minutes_between(last, stamp) > SESSION_GAP_MINUTES {
            durations.push(minutes_between(start, last));
            sessions.push(build_session(start, last, auths));
            start = stamp;
            auths = 1;
        } else {
            auths += 1;
        }
        last = stamp;
    }
    durations.push(minutes_between(start, last));
    sessions.push(build_session(start, last, auths));

    let average = durations.iter().sum::<f64>() / durations.len() as f64;
    Some(SessionAnalysis {
        total_sessions: sessions.len() as u32,
        average_session_duration: format!("{average:.0} minutes"),
        session_details: sessions,
    })
}

/// Contiguous active periods, split by the same 15-minute rule as sessions
/// but without per-session rates. Needs at least two points.
pub fn active_periods(timestamps: &[DateTime<Utc>]) -> Vec<Period> {
    if timestamps.len() < 2 {
        return Vec::new();
    }
    active_periods_sorted(&sorted(timestamps))
}

/// Runs of at least three authentications, each within two minutes of the
/// next.
pub fn frequent_reauths(timestamps: &[DateTime<Utc>]) -> Vec<FrequentReauth> {
    frequent_reauths_sorted(&sorted(timestamps))
}

/// The largest gap between consecutive authentications.
pub fn longest_gap(timestamps: &[DateTime<Utc>]) -> Option<Period> {
    longest_gap_sorted(&sorted(timestamps))
}

/// Rule-based issue summary over an analysed pattern.
pub fn potential_issues(pattern: &UsagePattern) -> Vec<PotentialIssue> {
    let mut issues = Vec::new();

    for reauth in &pattern.connection_stability.frequent_reauths {
        issues.push(PotentialIssue {
            kind: "frequent_reauth".to_string(),
            period: reauth.period.clone(),
            description: format!(
                "{} re-authentications within {}",
                reauth.count, reauth.interval
            ),
        });
    }

    if let Some(gap) = &pattern.connection_stability.longest_gap {
        if gap.duration_minutes > LONG_GAP_MINUTES {
            issues.push(PotentialIssue {
                kind: "long_gap".to_string(),
                period: format!("{} to {}", gap.start, gap.end),
                description: format!("No activity for {} minutes", gap.duration_minutes),
            });
        }
    }

    let total_auths: u32 = pattern.hourly_distribution.values().sum();
    if total_auths >= 2 && pattern.auth_intervals.min_minutes < 1 {
        issues.push(PotentialIssue {
            kind: "rapid_reauth".to_string(),
            period: "throughout session".to_string(),
            description: "Some re-authentications occurred less than 1 minute apart".to_string(),
        });
    }

    issues
}

fn active_periods_sorted(ts: &[DateTime<Utc>]) -> Vec<Period> {
    if ts.len() < 2 {
        return Vec::new();
    }
    let mut periods = Vec::new();
    let mut start = ts[0];
    let mut last = ts[0];
    let mut auths = 1u32;

    for &stamp in &ts[1..] {
        if minutes_between(last, stamp) > SESSION_GAP_MINUTES {
            periods.push(build_period(start, last, Some(auths)));
            start = stamp;
            auths = 1;
        } else {
            auths += 1;
        }
        last = stamp;
    }
    periods.push(build_period(start, last, Some(auths)));
    periods
}

fn frequent_reauths_sorted(ts: &[DateTime<Utc>]) -> Vec<FrequentReauth> {
    let mut reauths = Vec::new();
    let mut run_start = 0usize;

    for i in 1..=ts.len() {
        let run_continues =
            i < ts.len() && minutes_between(ts[i - 1], ts[i]) <= REAUTH_INTERVAL_MINUTES;
        if run_continues {
            continue;
        }
        let run = &ts[run_start..i];
        if run.len() >= REAUTH_MIN_COUNT {
            reauths.push(FrequentReauth {
                period: format!(
                    "{}-{}",
                    run[0].format("%H:%M"),
                    run[run.len() - 1].format("%H:%M")
                ),
                count: run.len() as u32,
                interval: format!("{}min", REAUTH_INTERVAL_MINUTES as i64),
            });
        }
        run_start = i;
    }

    reauths
}

fn longest_gap_sorted(ts: &[DateTime<Utc>]) -> Option<Period> {
    let mut gap: Option<(f64, DateTime<Utc>, DateTime<Utc>)> = None;
    for pair in ts.windows(2) {
        let minutes = minutes_between(pair[0], pair[1]);
        if gap.as_ref().is_none_or(|(widest, _, _)| minutes > *widest) {
            gap = Some((minutes, pair[0], pair[1]));
        }
    }
    gap.map(|(_, start, end)| build_period(start, end, None))
}

fn build_period(start: DateTime<Utc>, end: DateTime<Utc>, auth_count: Option<u32>) -> Period {
    Period {
        start: rfc3339(start),
        end: rfc3339(end),
        duration_minutes: minutes_between(start, end) as i64,
        auth_count,
    }
}

fn build_session(start: DateTime<Utc>, end: DateTime<Utc>, auths: u32) -> Session {
    let duration = minutes_between(start, end);
    Session {
        start: rfc3339(start),
        end: rfc3339(end),
        duration: format!("{duration:.0} minutes"),
        auths_count: auths,
        reauth_rate: format!("1 auth/{:.1} minutes", duration / f64::from(auths)),
    }
}

fn minutes_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_seconds() as f64 / 60.0
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn sorted(timestamps: &[DateTime<Utc>]) -> Vec<DateTime<Utc>> {
    let mut ts = timestamps.to_vec();
    ts.sort_unstable();
    ts
}
