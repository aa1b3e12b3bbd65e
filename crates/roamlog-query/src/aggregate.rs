//! Shared aggregation state and the merger task.
//!
//! Workers are stateless producers of [`AuthEvent`]s; a single merger task
//! consumes the entry stream, accumulates local auxiliary state, and takes
//! the shared mutex exactly once, after the channel closes, to materialise
//! the final result. That ordering makes "the merger runs last" a structural
//! property: the channel cannot close while a worker still holds a sender.

use crate::fold::AuthEvent;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

/// Per-user aggregation for the accept-by-realm query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStats {
    /// Distinct days with at least one accepted authentication.
    pub days_active: usize,

    /// Service providers this user was accepted at.
    pub providers: BTreeSet<String>,
}

/// Per-provider aggregation for the accept-by-realm query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStats {
    pub users: BTreeSet<String>,
}

/// Result of an accept-by-realm query run.
#[derive(Debug, Clone, Default)]
pub struct RealmResult {
    pub users: BTreeMap<String, UserStats>,
    pub providers: BTreeMap<String, ProviderStats>,
}

/// One user's activity on one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivity {
    pub realm: String,

    /// Sorted, deduplicated at the granularity the histogram reports.
    pub auth_timestamps: Vec<DateTime<Utc>>,
}

/// Per-station aggregation for the accept-by-SP query.
#[derive(Debug, Clone, Default)]
pub struct StationStats {
    pub total_auths: u64,
    pub users: BTreeMap<String, UserActivity>,
}

/// Per-realm aggregation for the accept-by-SP query.
#[derive(Debug, Clone, Default)]
pub struct RealmStats {
    pub users: BTreeSet<String>,
    pub stations: BTreeSet<String>,
    pub total_auths: u64,
}

/// Result of an accept-by-SP query run.
#[derive(Debug, Clone, Default)]
pub struct SpResult {
    pub stations: BTreeMap<String, StationStats>,
    pub realms: BTreeMap<String, RealmStats>,
}

/// Merger for the accept-by-realm entry stream.
pub async fn merge_realm(mut rx: Receiver<AuthEvent>, shared: Arc<Mutex<RealmResult>>) {
    let mut user_days: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
    let mut user_providers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut provider_users: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    while let Some(event) = rx.recv().await {
        user_days
            .entry(event.username.clone())
            .or_default()
            .insert(event.timestamp.date_naive());
        if let Some(provider) = event.service_provider {
            user_providers
                .entry(event.username.clone())
                .or_default()
                .insert(provider.clone());
            provider_users
                .entry(provider)
                .or_default()
                .insert(event.username);
        }
    }

    let mut result = shared.lock();
    for (username, days) in user_days {
        let providers = user_providers.remove(&username).unwrap_or_default();
        result.users.insert(
            username,
            UserStats {
                days_active: days.len(),
                providers,
            },
        );
    }
    for (provider, users) in provider_users {
        result.providers.insert(provider, ProviderStats { users });
    }
}

/// Merger for the accept-by-SP entry stream.
pub async fn merge_sp(mut rx: Receiver<AuthEvent>, shared: Arc<Mutex<SpResult>>) {
    struct LocalUser {
        realm: String,
        timestamps: BTreeSet<DateTime<Utc>>,
    }
    struct LocalStation {
        total_auths: u64,
        users: BTreeMap<String, LocalUser>,
    }

    let mut stations: BTreeMap<String, LocalStation> = BTreeMap::new();
    let mut realms: BTreeMap<String, RealmStats> = BTreeMap::new();

    while let Some(event) = rx.recv().await {
        let (Some(station_id), Some(realm)) = (event.station_id, event.realm) else {
            continue;
        };

        let station = stations.entry(station_id.clone()).or_insert(LocalStation {
            total_auths: 0,
            users: BTreeMap::new(),
        });
        station.total_auths += 1;
        station
            .users
            .entry(event.username.clone())
            .or_insert_with(|| LocalUser {
                realm: realm.clone(),
                timestamps: BTreeSet::new(),
            })
            .timestamps
            .insert(event.timestamp);

        let realm_stats = realms.entry(realm).or_default();
        realm_stats.users.insert(event.username);
        realm_stats.stations.insert(station_id);
        realm_stats.total_auths += 1;
    }

    let mut result = shared.lock();
    for (station_id, local) in stations {
        let users = local
            .users
            .into_iter()
            .map(|(username, user)| {
                (
                    username,
                    UserActivity {
                        realm: user.realm,
                        auth_timestamps: user.timestamps.into_iter().collect(),
                    },
                )
            })
            .collect();
        result.stations.insert(
            station_id,
            StationStats {
                total_auths: local.total_auths,
                users,
            },
        );
    }
    result.realms = realms;
}
