//! Report materialisation and output files.
//!
//! The aggregated result is flattened into a deterministic JSON document:
//! the same remote state always produces byte-identical output (the
//! filename's wall-clock timestamp aside). Every list is explicitly sorted;
//! map iteration order is never relied on for anything user-visible.

use crate::aggregate::{RealmResult, SpResult};
use crate::error::Result;
use crate::patterns::{
    potential_issues, session_analysis, usage_patterns, PotentialIssue, SessionAnalysis,
    UsagePattern,
};
use crate::window::{QueryWindow, WindowLabel};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

const REALM_DESCRIPTION: &str =
    "Aggregated Access-Accept events for the specified domain and time range.";
const SP_DESCRIPTION: &str =
    "Access-Accept device usage analysis for the specified service provider and time range.";

/// Accept-by-realm output document.
#[derive(Debug, Clone, Serialize)]
pub struct RealmReport {
    pub query_info: RealmQueryInfo,
    pub description: String,
    pub summary: RealmSummary,
    pub provider_stats: Vec<ProviderEntry>,
    pub user_stats: Vec<UserEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealmQueryInfo {
    pub domain: String,
    pub days: u32,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealmSummary {
    pub total_users: usize,
    pub total_providers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderEntry {
    pub provider: String,
    pub user_count: usize,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserEntry {
    pub username: String,
    pub days_active: usize,
    pub providers: Vec<String>,
}

/// Accept-by-SP output document.
#[derive(Debug, Clone, Serialize)]
pub struct SpReport {
    pub query_info: SpQueryInfo,
    pub description: String,
    pub summary: SpSummary,
    pub station_stats: Vec<StationEntry>,
    pub realm_stats: Vec<RealmEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpQueryInfo {
    pub service_provider: String,
    pub days: u32,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpSummary {
    pub unique_stations: usize,
    pub unique_users: usize,
    pub unique_realms: usize,
    pub total_authentications: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationEntry {
    pub station_id: String,
    pub total_auths: u64,
    pub total_users: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_patterns: Option<UsagePattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_analysis: Option<SessionAnalysis>,
    pub potential_issues: Vec<PotentialIssue>,
    pub user_details: Vec<UserDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub username: String,
    pub realm: String,
    pub auth_timestamps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealmEntry {
    pub realm: String,
    pub total_users: usize,
    pub total_stations: usize,
    pub total_auths: u64,
}

/// Flatten an accept-by-realm result.
///
/// Providers are sorted by descending user count, users by descending
/// days-active; ties break on the name.
pub fn build_realm_report(
    result: &RealmResult,
    domain: &str,
    window: &QueryWindow,
) -> RealmReport {
    let mut provider_stats: Vec<ProviderEntry> = result
        .providers
        .iter()
        .map(|(provider, stats)| ProviderEntry {
            provider: provider.clone(),
            user_count: stats.users.len(),
            users: stats.users.iter().cloned().collect(),
        })
        .collect();
    provider_stats.sort_by(|a, b| {
        b.user_count
            .cmp(&a.user_count)
            .then_with(|| a.provider.cmp(&b.provider))
    });

    let mut user_stats: Vec<UserEntry> = result
        .users
        .iter()
        .map(|(username, stats)| UserEntry {
            username: username.clone(),
            days_active: stats.days_active,
            providers: stats.providers.iter().cloned().collect(),
        })
        .collect();
    user_stats.sort_by(|a, b| {
        b.days_active
            .cmp(&a.days_active)
            .then_with(|| a.username.cmp(&b.username))
    });

    RealmReport {
        query_info: RealmQueryInfo {
            domain: domain.to_string(),
            days: window.days(),
            start_date: window.start_display(),
            end_date: window.end_display(),
        },
        description: REALM_DESCRIPTION.to_string(),
        summary: RealmSummary {
            total_users: result.users.len(),
            total_providers: result.providers.len(),
        },
        provider_stats,
        user_stats,
    }
}

/// Flatten an accept-by-SP result.
///
/// Stations and realm entries are sorted by descending user count with the
/// name as tie-break; user details are sorted by username. Each station's
/// pattern analysis runs over the union of its users' auth timestamps.
pub fn build_sp_report(result: &SpResult, service_provider: &str, window: &QueryWindow) -> SpReport {
    let mut unique_users = std::collections::BTreeSet::new();
    let mut total_auths = 0u64;

    let mut station_stats: Vec<StationEntry> = result
        .stations
        .iter()
        .map(|(station_id, stats)| {
            total_auths += stats.total_auths;

            let mut station_timestamps = Vec::new();
            let user_details: Vec<UserDetail> = stats
                .users
                .iter()
                .map(|(username, activity)| {
                    unique_users.insert(username.clone());
                    station_timestamps.extend(activity.auth_timestamps.iter().copied());
                    UserDetail {
                        username: username.clone(),
                        realm: activity.realm.clone(),
                        auth_timestamps: activity
                            .auth_timestamps
                            .iter()
                            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
                            .collect(),
                    }
                })
                .collect();

            let patterns = usage_patterns(&station_timestamps);
            let issues = patterns.as_ref().map(potential_issues).unwrap_or_default();

            StationEntry {
                station_id: station_id.clone(),
                total_auths: stats.total_auths,
                total_users: stats.users.len(),
                session_analysis: session_analysis(&station_timestamps),
                usage_patterns: patterns,
                potential_issues: issues,
                user_details,
            }
        })
        .collect();
    station_stats.sort_by(|a, b| {
        b.total_users
            .cmp(&a.total_users)
            .then_with(|| a.station_id.cmp(&b.station_id))
    });

    let mut realm_stats: Vec<RealmEntry> = result
        .realms
        .iter()
        .map(|(realm, stats)| RealmEntry {
            realm: realm.clone(),
            total_users: stats.users.len(),
            total_stations: stats.stations.len(),
            total_auths: stats.total_auths,
        })
        .collect();
    realm_stats.sort_by(|a, b| {
        b.total_users
            .cmp(&a.total_users)
            .then_with(|| a.realm.cmp(&b.realm))
    });

    SpReport {
        query_info: SpQueryInfo {
            service_provider: service_provider.to_string(),
            days: window.days(),
            start_date: window.start_display(),
            end_date: window.end_display(),
        },
        description: SP_DESCRIPTION.to_string(),
        summary: SpSummary {
            unique_stations: result.stations.len(),
            unique_users: unique_users.len(),
            unique_realms: result.realms.len(),
            total_authentications: total_auths,
        },
        station_stats,
        realm_stats,
    }
}

/// Write a pretty-printed report under `<root>/<name>/`, creating the
/// directory when absent.
///
/// Filename: `<YYYYMMDD-HHMMSS>-<suffix>[-stationid].json`, where the suffix
/// comes from the window label.
pub fn write_report<T: Serialize>(
    output_root: &Path,
    dir_name: &str,
    label: &WindowLabel,
    station_suffix: bool,
    report: &T,
) -> Result<PathBuf> {
    let dir = output_root.join(dir_name);
    std::fs::create_dir_all(&dir)?;

    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix = label.file_suffix();
    let filename = if station_suffix {
        format!("{stamp}-{suffix}-stationid.json")
    } else {
        format!("{stamp}-{suffix}.json")
    };
    let path = dir.join(filename);

    let json = serde_json::to_vec_pretty(report).map_err(crate::error::Error::Json)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ProviderStats, RealmStats, StationStats, UserActivity, UserStats};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::collections::{BTreeMap, BTreeSet};

    fn window() -> QueryWindow {
        QueryWindow::last_days_from(3, NaiveDate::from_ymd_opt(2024, 10, 14).unwrap())
    }

    fn names(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn realm_result() -> RealmResult {
        let mut users = BTreeMap::new();
        users.insert(
            "alice@ku.ac.th".to_string(),
            UserStats {
                days_active: 3,
                providers: names(&["sp1"]),
            },
        );
        users.insert(
            "bob@ku.ac.th".to_string(),
            UserStats {
                days_active: 3,
                providers: names(&["sp1", "sp2"]),
            },
        );
        let mut providers = BTreeMap::new();
        providers.insert(
            "sp1".to_string(),
            ProviderStats {
                users: names(&["alice@ku.ac.th", "bob@ku.ac.th"]),
            },
        );
        providers.insert(
            "sp2".to_string(),
            ProviderStats {
                users: names(&["bob@ku.ac.th"]),
            },
        );
        RealmResult { users, providers }
    }

    #[test]
    fn realm_report_summary_and_sorts() {
        let report = build_realm_report(&realm_result(), "eduroam.ku.ac.th", &window());

        assert_eq!(report.summary.total_users, 2);
        assert_eq!(report.summary.total_providers, 2);
        assert_eq!(report.query_info.days, 3);
        assert_eq!(report.query_info.start_date, "2024-10-12 00:00:00");
        assert_eq!(report.query_info.end_date, "2024-10-14 23:59:59");

        // sp1 has more users, so it sorts first.
        assert_eq!(report.provider_stats[0].provider, "sp1");
        assert_eq!(report.provider_stats[0].user_count, 2);
        assert_eq!(report.provider_stats[1].provider, "sp2");

        // Equal days-active ties break on username.
        assert_eq!(report.user_stats[0].username, "alice@ku.ac.th");
        assert_eq!(report.user_stats[1].username, "bob@ku.ac.th");
        assert_eq!(report.user_stats[1].providers, ["sp1", "sp2"]);
    }

    #[test]
    fn realm_report_ties_break_on_provider_name() {
        let mut result = RealmResult::default();
        for provider in ["zeta", "alpha"] {
            result.providers.insert(
                provider.to_string(),
                ProviderStats {
                    users: names(&["u@x.th"]),
                },
            );
        }
        result.users.insert(
            "u@x.th".to_string(),
            UserStats {
                days_active: 1,
                providers: names(&["alpha", "zeta"]),
            },
        );

        let report = build_realm_report(&result, "eduroam.x.ac.th", &window());
        assert_eq!(report.provider_stats[0].provider, "alpha");
        assert_eq!(report.provider_stats[1].provider, "zeta");
    }

    #[test]
    fn realm_report_serializes_expected_keys() {
        let report = build_realm_report(&realm_result(), "eduroam.ku.ac.th", &window());
        let value = serde_json::to_value(&report).unwrap();

        assert!(value.get("query_info").is_some());
        assert!(value.get("description").is_some());
        assert_eq!(value["summary"]["total_users"], 2);
        assert_eq!(value["provider_stats"][0]["user_count"], 2);
        assert_eq!(value["user_stats"][0]["days_active"], 3);
        assert_eq!(value["query_info"]["domain"], "eduroam.ku.ac.th");
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 14, h, m, s).unwrap()
    }

    fn sp_result() -> SpResult {
        let mut users = BTreeMap::new();
        users.insert(
            "alice@r1.ac.th".to_string(),
            UserActivity {
                realm: "eduroam.r1.ac.th".to_string(),
                auth_timestamps: vec![at(9, 0, 0), at(9, 0, 30)],
            },
        );
        users.insert(
            "bob@r2.ac.th".to_string(),
            UserActivity {
                realm: "eduroam.r2.ac.th".to_string(),
                auth_timestamps: vec![at(9, 0, 45)],
            },
        );
        let mut stations = BTreeMap::new();
        stations.insert(
            "S1".to_string(),
            StationStats {
                total_auths: 4,
                users,
            },
        );

        let mut realms = BTreeMap::new();
        realms.insert(
            "eduroam.r1.ac.th".to_string(),
            RealmStats {
                users: names(&["alice@r1.ac.th"]),
                stations: names(&["S1"]),
                total_auths: 3,
            },
        );
        realms.insert(
            "eduroam.r2.ac.th".to_string(),
            RealmStats {
                users: names(&["bob@r2.ac.th"]),
                stations: names(&["S1"]),
                total_auths: 1,
            },
        );
        SpResult { stations, realms }
    }

    #[test]
    fn sp_report_summary_counts_across_stations() {
        let report = build_sp_report(
            &sp_result(),
            "eduroam.x.ac.th",
            &QueryWindow::single_date(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()),
        );

        assert_eq!(report.summary.unique_stations, 1);
        assert_eq!(report.summary.unique_users, 2);
        assert_eq!(report.summary.unique_realms, 2);
        assert_eq!(report.summary.total_authentications, 4);
    }

    #[test]
    fn sp_station_analysis_runs_over_the_union_of_user_timestamps() {
        let report = build_sp_report(
            &sp_result(),
            "eduroam.x.ac.th",
            &QueryWindow::single_date(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()),
        );

        let station = &report.station_stats[0];
        assert_eq!(station.station_id, "S1");
        assert_eq!(station.total_users, 2);

        let patterns = station.usage_patterns.as_ref().unwrap();
        // Three auths inside one minute: one active period, sub-minute gaps.
        assert_eq!(patterns.active_periods.len(), 1);
        assert_eq!(
            patterns
                .connection_stability
                .longest_gap
                .as_ref()
                .unwrap()
                .duration_minutes,
            0
        );
        assert!(station
            .potential_issues
            .iter()
            .any(|i| i.kind == "rapid_reauth"));

        // User details sorted by username, timestamps RFC3339.
        assert_eq!(station.user_details[0].username, "alice@r1.ac.th");
        assert_eq!(
            station.user_details[0].auth_timestamps[0],
            "2024-10-14T09:00:00Z"
        );
        assert_eq!(station.user_details[1].username, "bob@r2.ac.th");
    }

    #[test]
    fn sp_report_sorts_stations_by_user_count() {
        let mut result = sp_result();
        let mut solo_users = BTreeMap::new();
        solo_users.insert(
            "carol@r1.ac.th".to_string(),
            UserActivity {
                realm: "eduroam.r1.ac.th".to_string(),
                auth_timestamps: vec![at(10, 0, 0)],
            },
        );
        result.stations.insert(
            "A0-SOLO".to_string(),
            StationStats {
                total_auths: 99,
                users: solo_users,
            },
        );

        let report = build_sp_report(
            &result,
            "eduroam.x.ac.th",
            &QueryWindow::single_date(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()),
        );

        // S1 has two users and sorts first despite fewer total auths.
        assert_eq!(report.station_stats[0].station_id, "S1");
        assert_eq!(report.station_stats[1].station_id, "A0-SOLO");
    }

    #[test]
    fn sp_single_auth_station_has_no_session_analysis() {
        let mut users = BTreeMap::new();
        users.insert(
            "solo@r1.ac.th".to_string(),
            UserActivity {
                realm: "eduroam.r1.ac.th".to_string(),
                auth_timestamps: vec![at(9, 0, 0)],
            },
        );
        let mut result = SpResult::default();
        result.stations.insert(
            "S9".to_string(),
            StationStats {
                total_auths: 1,
                users,
            },
        );

        let report = build_sp_report(
            &result,
            "eduroam.x.ac.th",
            &QueryWindow::single_date(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()),
        );
        let station = &report.station_stats[0];
        assert!(station.session_analysis.is_none());
        assert!(station.usage_patterns.is_some());
        assert!(station.potential_issues.is_empty());
    }

    #[test]
    fn write_report_creates_directory_and_suffixed_filename() {
        let root = tempfile::tempdir().unwrap();
        let report = build_realm_report(&realm_result(), "eduroam.ku.ac.th", &window());

        let path = write_report(
            root.path(),
            "ku.ac.th",
            &WindowLabel::Days(3),
            false,
            &report,
        )
        .unwrap();

        assert!(path.starts_with(root.path().join("ku.ac.th")));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("-3d.json"), "unexpected name {name}");

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["summary"]["total_users"], 2);
    }

    #[test]
    fn write_report_station_suffix() {
        let root = tempfile::tempdir().unwrap();
        let report = build_sp_report(
            &sp_result(),
            "eduroam.x.ac.th",
            &QueryWindow::single_date(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()),
        );

        let path = write_report(
            root.path(),
            "eduroam-x-ac-th",
            &WindowLabel::Date(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()),
            true,
            &report,
        )
        .unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("-20241014-stationid.json"), "{name}");
    }

    #[test]
    fn identical_input_serialises_identically() {
        let report_a = build_realm_report(&realm_result(), "eduroam.ku.ac.th", &window());
        let report_b = build_realm_report(&realm_result(), "eduroam.ku.ac.th", &window());
        assert_eq!(
            serde_json::to_string_pretty(&report_a).unwrap(),
            serde_json::to_string_pretty(&report_b).unwrap()
        );
    }
}
