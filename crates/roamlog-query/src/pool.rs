//! Fan-out / fan-in query driver.
//!
//! The requested window is sharded into per-day jobs, pre-enqueued into a
//! bounded channel, and drained by a fixed pool of worker tasks. Each worker
//! queries Quickwit, folds the bucket tree, and streams synthetic entries to
//! the single merger task. The driver joins the workers, then the merger,
//! then inspects the first-error-wins channel, in that order: the merger has
//! always run to completion before a result or an error is returned.

use crate::aggregate::{merge_realm, merge_sp, RealmResult, SpResult};
use crate::client::{realm_aggs, station_aggs, SearchClient};
use crate::error::{Error, Result};
use crate::fold::{fold_realm, fold_stations, AuthEvent};
use crate::window::{Job, QueryWindow};
use parking_lot::Mutex;
use serde_json::Value;
use std::io::Write;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Fixed size of the query worker pool.
pub const NUM_WORKERS: usize = 10;

const ENTRY_CHANNEL_CAPACITY: usize = 10_000;

type FoldFn = fn(&Value) -> Result<(Vec<AuthEvent>, u64)>;

/// Counters accumulated across the pool run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    /// Sum of the document counts the index reported per job.
    pub total_hits: u64,

    /// Jobs completed without error.
    pub processed_days: u32,
}

/// Run an accept-by-realm query across the window.
pub async fn run_realm_query(
    client: Arc<SearchClient>,
    query: String,
    window: &QueryWindow,
) -> Result<(RealmResult, PoolStats)> {
    let shared = Arc::new(Mutex::new(RealmResult::default()));
    let merger_state = Arc::clone(&shared);
    let stats = run_pool(client, query, realm_aggs(), window.jobs(), fold_realm, |rx| {
        tokio::spawn(merge_realm(rx, merger_state))
    })
    .await?;
    let result = shared.lock().clone();
    Ok((result, stats))
}

/// Run an accept-by-SP query across the window.
pub async fn run_sp_query(
    client: Arc<SearchClient>,
    query: String,
    window: &QueryWindow,
) -> Result<(SpResult, PoolStats)> {
    let shared = Arc::new(Mutex::new(SpResult::default()));
    let merger_state = Arc::clone(&shared);
    let stats = run_pool(
        client,
        query,
        station_aggs(),
        window.jobs(),
        fold_stations,
        |rx| tokio::spawn(merge_sp(rx, merger_state)),
    )
    .await?;
    let result = shared.lock().clone();
    Ok((result, stats))
}

#[derive(Clone)]
struct WorkerContext {
    client: Arc<SearchClient>,
    query: Arc<str>,
    aggs: Arc<Value>,
    fold: FoldFn,
    jobs: crossbeam_channel::Receiver<Job>,
    entries: mpsc::Sender<AuthEvent>,
    errors: crossbeam_channel::Sender<Error>,
    hits: Arc<AtomicU64>,
    processed: Arc<AtomicU32>,
    total_days: u32,
}

async fn run_pool(
    client: Arc<SearchClient>,
    query: String,
    aggs: Value,
    jobs: Vec<Job>,
    fold: FoldFn,
    spawn_merger: impl FnOnce(mpsc::Receiver<AuthEvent>) -> tokio::task::JoinHandle<()>,
) -> Result<PoolStats> {
    let total_days = jobs.len() as u32;

    // All jobs are enqueued and the sender dropped before any worker starts,
    // so a worker's recv() never blocks: it pops a job or sees disconnect.
    let (job_tx, job_rx) = crossbeam_channel::bounded(jobs.len().max(1));
    for job in jobs {
        job_tx.send(job).map_err(|e| Error::Merge(e.to_string()))?;
    }
    drop(job_tx);

    let (entry_tx, entry_rx) = mpsc::channel(ENTRY_CHANNEL_CAPACITY);
    let (err_tx, err_rx) = crossbeam_channel::bounded::<Error>(1);
    let hits = Arc::new(AtomicU64::new(0));
    let processed = Arc::new(AtomicU32::new(0));

    let merger = spawn_merger(entry_rx);

    let context = WorkerContext {
        client,
        query: Arc::from(query),
        aggs: Arc::new(aggs),
        fold,
        jobs: job_rx,
        entries: entry_tx,
        errors: err_tx,
        hits: Arc::clone(&hits),
        processed: Arc::clone(&processed),
        total_days,
    };

    let mut workers = Vec::with_capacity(NUM_WORKERS);
    for _ in 0..NUM_WORKERS {
        workers.push(tokio::spawn(worker_loop(context.clone())));
    }
    // The workers own the only entry senders now; the channel closes when
    // the last of them exits.
    drop(context);

    // A panicking worker never reaches its error channel send, so its
    // JoinError must fail the run itself.
    let mut worker_panic: Option<Error> = None;
    for handle in workers {
        if let Err(err) = handle.await {
            warn!("worker task failed: {err}");
            if worker_panic.is_none() {
                worker_panic = Some(Error::Merge(format!("worker panicked: {err}")));
            }
        }
    }
    merger
        .await
        .map_err(|e| Error::Merge(e.to_string()))?;

    if let Some(err) = worker_panic {
        return Err(err);
    }
    if let Ok(err) = err_rx.try_recv() {
        return Err(err);
    }
    Ok(PoolStats {
        total_hits: hits.load(Ordering::Relaxed),
        processed_days: processed.load(Ordering::Relaxed),
    })
}

/// One worker: drain jobs until the queue is empty or a query fails.
///
/// The first failing worker parks its error in the size-1 channel and exits;
/// later failures are dropped. Other workers keep draining the queue.
async fn worker_loop(ctx: WorkerContext) {
    while let Ok(job) = ctx.jobs.recv() {
        let response = match ctx.client.search(&ctx.query, job, &ctx.aggs).await {
            Ok(response) => response,
            Err(err) => {
                let _ = ctx.errors.try_send(err);
                return;
            }
        };
        let (events, job_hits) = match (ctx.fold)(&response) {
            Ok(folded) => folded,
            Err(err) => {
                let _ = ctx.errors.try_send(err);
                return;
            }
        };

        for event in events {
            if ctx.entries.send(event).await.is_err() {
                return;
            }
        }

        let seen = ctx.hits.fetch_add(job_hits, Ordering::Relaxed) + job_hits;
        let done = ctx.processed.fetch_add(1, Ordering::Relaxed) + 1;
        // Best-effort single-line repaint; interleaving only ever shows a
        // slightly stale count.
        print!(
            "\rProgress: {done}/{} days processed, Total hits: {seen}",
            ctx.total_days
        );
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use roamlog_core::QuickwitAuth;
    use serde_json::json;

    fn client(url: &str) -> Arc<SearchClient> {
        Arc::new(
            SearchClient::new(&QuickwitAuth {
                user: "reader".to_string(),
                pass: "pw".to_string(),
                url: url.to_string(),
            })
            .unwrap(),
        )
    }

    fn window(days: u32) -> QueryWindow {
        QueryWindow::last_days_from(days, NaiveDate::from_ymd_opt(2024, 10, 14).unwrap())
    }

    const DAY1_MS: f64 = 1_728_691_200_000.0; // 2024-10-12T00:00:00Z
    const DAY2_MS: f64 = 1_728_777_600_000.0;
    const DAY3_MS: f64 = 1_728_864_000_000.0;

    fn realm_body() -> serde_json::Value {
        json!({
            "num_hits": 6,
            "aggregations": { "unique_users": { "buckets": [
                {
                    "key": "alice@ku.ac.th",
                    "doc_count": 3,
                    "providers": { "buckets": [
                        { "key": "eduroam.sp1.ac.th", "doc_count": 3 }
                    ]},
                    "daily": { "buckets": [
                        { "key": DAY1_MS, "doc_count": 1 },
                        { "key": DAY2_MS, "doc_count": 1 },
                        { "key": DAY3_MS, "doc_count": 1 }
                    ]}
                },
                {
                    "key": "bob@ku.ac.th",
                    "doc_count": 3,
                    "providers": { "buckets": [
                        { "key": "eduroam.sp1.ac.th", "doc_count": 2 },
                        { "key": "eduroam.sp2.ac.th", "doc_count": 1 }
                    ]},
                    "daily": { "buckets": [
                        { "key": DAY1_MS, "doc_count": 1 },
                        { "key": DAY2_MS, "doc_count": 1 },
                        { "key": DAY3_MS, "doc_count": 1 }
                    ]}
                }
            ]}}
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn realm_query_over_three_days_aggregates_users_and_providers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v1/nro-logs/search");
            then.status(200).json_body(realm_body());
        });

        let (result, stats) = run_realm_query(
            client(&server.base_url()),
            crate::client::realm_query("eduroam.ku.ac.th"),
            &window(3),
        )
        .await
        .unwrap();

        assert_eq!(mock.hits(), 3);
        assert_eq!(stats.processed_days, 3);
        assert_eq!(stats.total_hits, 18);

        assert_eq!(result.users.len(), 2);
        let alice = &result.users["alice@ku.ac.th"];
        assert_eq!(alice.days_active, 3);
        assert_eq!(
            alice.providers.iter().collect::<Vec<_>>(),
            ["eduroam.sp1.ac.th"]
        );
        let bob = &result.users["bob@ku.ac.th"];
        assert_eq!(bob.days_active, 3);
        assert_eq!(
            bob.providers.iter().collect::<Vec<_>>(),
            ["eduroam.sp1.ac.th", "eduroam.sp2.ac.th"]
        );

        assert_eq!(result.providers.len(), 2);
        assert_eq!(result.providers["eduroam.sp1.ac.th"].users.len(), 2);
        assert_eq!(result.providers["eduroam.sp2.ac.th"].users.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_jobs_surface_exactly_one_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/nro-logs/search");
            then.status(500).body("shard down");
        });

        let err = run_realm_query(
            client(&server.base_url()),
            crate::client::realm_query("eduroam.ku.ac.th"),
            &window(10),
        )
        .await
        .unwrap_err();

        match err {
            Error::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("shard down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shape_error_fails_the_run() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/nro-logs/search");
            then.status(200).body(r#"{"num_hits": 0}"#);
        });

        let err = run_realm_query(
            client(&server.base_url()),
            crate::client::realm_query("eduroam.ku.ac.th"),
            &window(2),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sp_query_single_day_builds_station_result() {
        let base_ms = 1_728_864_000_000.0f64;
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/nro-logs/search");
            then.status(200).json_body(json!({
                "aggregations": { "by_station": { "buckets": [{
                    "key": "S1",
                    "doc_count": 4,
                    "by_user": { "buckets": [
                        {
                            "key": "alice@r1.ac.th",
                            "doc_count": 3,
                            "by_realm": { "buckets": [{ "key": "eduroam.r1.ac.th", "doc_count": 3 }] },
                            "auth_times": { "buckets": [
                                { "key": base_ms, "doc_count": 2 },
                                { "key": base_ms + 30_000.0, "doc_count": 1 }
                            ]}
                        },
                        {
                            "key": "bob@r2.ac.th",
                            "doc_count": 1,
                            "by_realm": { "buckets": [{ "key": "eduroam.r2.ac.th", "doc_count": 1 }] },
                            "auth_times": { "buckets": [
                                { "key": base_ms + 45_000.0, "doc_count": 1 }
                            ]}
                        }
                    ]}
                }]}}
            }));
        });

        let (result, stats) = run_sp_query(
            client(&server.base_url()),
            crate::client::sp_query("eduroam.x.ac.th"),
            &QueryWindow::single_date(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()),
        )
        .await
        .unwrap();

        assert_eq!(stats.processed_days, 1);
        assert_eq!(stats.total_hits, 4);
        assert_eq!(result.stations.len(), 1);
        assert_eq!(result.stations["S1"].users.len(), 2);
        assert_eq!(result.realms.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_aggregations_produce_empty_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/nro-logs/search");
            then.status(200)
                .body(r#"{"aggregations": {"unique_users": {"buckets": []}}}"#);
        });

        let (result, stats) = run_realm_query(
            client(&server.base_url()),
            crate::client::realm_query("eduroam.ku.ac.th"),
            &window(1),
        )
        .await
        .unwrap();

        assert!(result.users.is_empty());
        assert!(result.providers.is_empty());
        assert_eq!(stats.total_hits, 0);
        assert_eq!(stats.processed_days, 1);
    }
}
