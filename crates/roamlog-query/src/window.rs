//! Query time windows and per-day job sharding.
//!
//! A window is an inclusive, day-aligned date interval. For querying it is
//! sharded into consecutive half-open per-day [`Job`]s, each exactly one day
//! wide, that cover the window with no gaps and no overlap.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Longest realm-query lookback, in days.
pub const MAX_REALM_DAYS: u32 = 366;

/// Longest service-provider-query lookback, in days.
pub const MAX_SP_DAYS: u32 = 3650;

const SECONDS_PER_DAY: i64 = 86_400;

/// One day's query interval, expressed as half-open whole-second Unix
/// timestamps `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub start_ts: i64,
    pub end_ts: i64,
}

/// How the window was requested; decides the output filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLabel {
    /// A day-count lookback (`30` → `30d`).
    Days(u32),
    /// A single explicit date (`14-10-2024` → `20241014`).
    Date(NaiveDate),
    /// A whole calendar year (`y2024` → `2024`).
    Year(i32),
}

impl WindowLabel {
    pub fn file_suffix(&self) -> String {
        match self {
            WindowLabel::Days(days) => format!("{days}d"),
            WindowLabel::Date(date) => date.format("%Y%m%d").to_string(),
            WindowLabel::Year(year) => year.to_string(),
        }
    }
}

/// An inclusive day-aligned date interval to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub label: WindowLabel,
}

impl QueryWindow {
    /// The last `days` days, ending today.
    pub fn last_days(days: u32) -> QueryWindow {
        QueryWindow::last_days_from(days, Utc::now().date_naive())
    }

    /// The last `days` days ending at an explicit date.
    pub fn last_days_from(days: u32, end_date: NaiveDate) -> QueryWindow {
        let lookback = Duration::days(i64::from(days.max(1)) - 1);
        QueryWindow {
            start_date: end_date - lookback,
            end_date,
            label: WindowLabel::Days(days),
        }
    }

    /// A single explicit date.
    pub fn single_date(date: NaiveDate) -> QueryWindow {
        QueryWindow {
            start_date: date,
            end_date: date,
            label: WindowLabel::Date(date),
        }
    }

    /// A whole calendar year, leap years included.
    pub fn calendar_year(year: i32) -> Result<QueryWindow> {
        let start_date = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid year {year}")))?;
        let end_date = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid year {year}")))?;
        Ok(QueryWindow {
            start_date,
            end_date,
            label: WindowLabel::Year(year),
        })
    }

    /// Number of days covered, inclusive of both ends.
    pub fn days(&self) -> u32 {
        ((self.end_date - self.start_date).num_days() + 1) as u32
    }

    /// Window start instant (midnight of the start date, UTC).
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start_date.and_time(NaiveTime::MIN))
    }

    /// Exclusive end instant: midnight after the end date.
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&(self.end_date + Duration::days(1)).and_time(NaiveTime::MIN))
    }

    /// `query_info` display form of the start, `YYYY-MM-DD 00:00:00`.
    pub fn start_display(&self) -> String {
        format!("{} 00:00:00", self.start_date.format("%Y-%m-%d"))
    }

    /// `query_info` display form of the end, `YYYY-MM-DD 23:59:59`.
    pub fn end_display(&self) -> String {
        format!("{} 23:59:59", self.end_date.format("%Y-%m-%d"))
    }

    /// Shard the window into per-day Jobs. Their union is exactly
    /// `[start, end_exclusive)` and no two overlap.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(self.days() as usize);
        let mut day_start = self.start().timestamp();
        let end = self.end_exclusive().timestamp();
        while day_start < end {
            jobs.push(Job {
                start_ts: day_start,
                end_ts: day_start + SECONDS_PER_DAY,
            });
            day_start += SECONDS_PER_DAY;
        }
        jobs
    }
}

/// Parse the realm tool's optional window argument: a day count in
/// `[1, 366]` or a `DD-MM-YYYY` date.
pub fn parse_realm_window(arg: Option<&str>) -> Result<QueryWindow> {
    let Some(arg) = arg else {
        return Ok(QueryWindow::last_days(1));
    };
    if arg.chars().all(|c| c.is_ascii_digit()) {
        let days: u32 = arg
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("invalid day count {arg}")))?;
        if !(1..=MAX_REALM_DAYS).contains(&days) {
            return Err(Error::InvalidArgument(format!(
                "invalid number of days, must be between 1 and {MAX_REALM_DAYS}"
            )));
        }
        return Ok(QueryWindow::last_days(days));
    }
    parse_date_arg(arg)
}

/// Parse the SP tool's optional window argument: a day count in `[1, 3650]`,
/// `Ny` with `N` in `[1, 10]`, `yYYYY` with `YYYY` in `[2000, 2100]`, or a
/// `DD-MM-YYYY` date.
pub fn parse_sp_window(arg: Option<&str>) -> Result<QueryWindow> {
    let Some(arg) = arg else {
        return Ok(QueryWindow::last_days(1));
    };

    if let Some(year_digits) = arg.strip_prefix('y') {
        if year_digits.len() == 4 && year_digits.chars().all(|c| c.is_ascii_digit()) {
            let year: i32 = year_digits
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("invalid year {arg}")))?;
            if !(2000..=2100).contains(&year) {
                return Err(Error::InvalidArgument(
                    "invalid year range, must be between 2000 and 2100".to_string(),
                ));
            }
            return QueryWindow::calendar_year(year);
        }
    }

    if let Some(count) = arg.strip_suffix('y') {
        if !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) {
            let years: u32 = count
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("invalid year count {arg}")))?;
            if !(1..=10).contains(&years) {
                return Err(Error::InvalidArgument(
                    "invalid year range, must be between 1y and 10y".to_string(),
                ));
            }
            return Ok(QueryWindow::last_days(years * 365));
        }
    }

    if arg.chars().all(|c| c.is_ascii_digit()) {
        let days: u32 = arg
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("invalid day count {arg}")))?;
        if !(1..=MAX_SP_DAYS).contains(&days) {
            return Err(Error::InvalidArgument(format!(
                "invalid number of days, must be between 1 and {MAX_SP_DAYS}"
            )));
        }
        return Ok(QueryWindow::last_days(days));
    }

    parse_date_arg(arg)
}

fn parse_date_arg(arg: &str) -> Result<QueryWindow> {
    let date = NaiveDate::parse_from_str(arg, "%d-%m-%Y")
        .map_err(|e| Error::InvalidArgument(format!("invalid date format, use DD-MM-YYYY: {e}")))?;
    Ok(QueryWindow::single_date(date))
}

/// Expand a realm argument to the full IdP domain.
pub fn resolve_realm_domain(input: &str) -> String {
    match input {
        "etlr1" => "etlr1.eduroam.org".to_string(),
        "etlr2" => "etlr2.eduroam.org".to_string(),
        other => format!("eduroam.{other}"),
    }
}

/// Expand a service-provider argument to the full SP domain; an input that
/// already carries the `eduroam.` prefix is kept as-is.
pub fn resolve_service_provider(input: &str) -> String {
    match input {
        "etlr1" => "etlr1.eduroam.org".to_string(),
        "etlr2" => "etlr2.eduroam.org".to_string(),
        other if other.starts_with("eduroam.") => other.to_string(),
        other => format!("eduroam.{other}"),
    }
}
