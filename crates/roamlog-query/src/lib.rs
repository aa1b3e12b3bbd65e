//! Aggregation query tools over the Quickwit federation log index.
//!
//! # Architecture
//!
//! ```text
//! CLI args ──▶ QueryWindow ──▶ per-day Jobs ──▶ [Worker ×10] ──▶ SearchClient
//!                                                  │
//!                                     folded AuthEvents (bounded channel)
//!                                                  │
//!                                                  ▼
//!                                              [Merger] ──▶ Result ──▶ Report
//! ```
//!
//! Two query shapes are supported: accept-by-realm ("which of this IdP's
//! users roamed where") and accept-by-SP ("which devices and realms hit this
//! service provider"). Both share the worker pool, the entry channel, the
//! first-error-wins failure model, and the report writer.

pub mod aggregate;
pub mod client;
pub mod error;
pub mod fold;
pub mod patterns;
pub mod pool;
pub mod report;
pub mod window;

pub use aggregate::{
    ProviderStats, RealmResult, RealmStats, SpResult, StationStats, UserActivity, UserStats,
};
pub use client::{realm_aggs, realm_query, sp_query, station_aggs, SearchClient};
pub use error::{Error, Result};
pub use fold::{fold_realm, fold_stations, AuthEvent};
pub use pool::{run_realm_query, run_sp_query, PoolStats, NUM_WORKERS};
pub use report::{build_realm_report, build_sp_report, write_report, RealmReport, SpReport};
pub use window::{
    parse_realm_window, parse_sp_window, resolve_realm_domain, resolve_service_provider, Job,
    QueryWindow, WindowLabel,
};
