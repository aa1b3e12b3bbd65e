//! Accept-by-service-provider analysis tool.
//!
//! Analyses Access-Accept events at one service provider with a focus on
//! device usage: which stations appeared, which users and realms they
//! carried, and what their authentication patterns look like.
//!
//! ```bash
//! roamlog-sp ku.ac.th 90          # last 90 days
//! roamlog-sp ku.ac.th 2y          # last two years
//! roamlog-sp ku.ac.th y2024       # the 2024 calendar year
//! roamlog-sp ku.ac.th 14-10-2024  # one specific date
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use roamlog_core::QuickwitAuth;
use roamlog_query::{
    build_sp_report, parse_sp_window, resolve_service_provider, run_sp_query, sp_query,
    write_report, SearchClient, WindowLabel,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Analyses Access-Accept device usage at a service provider.
#[derive(Parser, Debug)]
#[command(name = "roamlog-sp")]
#[command(about = "Analyses Access-Accept device usage at a service provider")]
#[command(version)]
struct Args {
    /// Service provider to search (e.g. 'ku.ac.th', 'etlr1', 'etlr2')
    service_provider: String,

    /// Days (1-3650), years ('1y'-'10y'), a calendar year ('y2024'),
    /// or a specific date as DD-MM-YYYY
    #[arg(value_name = "DAYS|Ny|yYYYY|DD-MM-YYYY")]
    window: Option<String>,

    /// Quickwit credentials properties file
    #[arg(long, default_value = "qw-auth.properties")]
    auth: PathBuf,

    /// Root directory for report output
    #[arg(long, default_value = "output")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let args = Args::parse();
    let overall_start = Instant::now();

    let window = parse_sp_window(args.window.as_deref())
        .context("usage: roamlog-sp <service_provider> [days|Ny|yYYYY|DD-MM-YYYY]")?;
    let service_provider = resolve_service_provider(&args.service_provider);
    let auth = QuickwitAuth::load(&args.auth)
        .with_context(|| format!("error reading properties from {}", args.auth.display()))?;
    let client = Arc::new(SearchClient::new(&auth).context("failed to create search client")?);

    match window.label {
        WindowLabel::Date(date) => println!("Searching for date: {date}"),
        _ => println!(
            "Searching from {} to {}",
            window.start_date, window.end_date
        ),
    }

    let query_start = Instant::now();
    let (result, stats) = run_sp_query(client, sp_query(&service_provider), &window)
        .await
        .context("query run failed")?;
    let query_elapsed = query_start.elapsed();

    println!();
    println!("Total hits: {}", stats.total_hits);
    println!("Number of unique stations: {}", result.stations.len());
    println!("Number of realms: {}", result.realms.len());

    let process_start = Instant::now();
    let report = build_sp_report(&result, &service_provider, &window);
    let process_elapsed = process_start.elapsed();

    let dir_name = service_provider.replace('.', "-");
    let path = write_report(&args.output, &dir_name, &window.label, true, &report)
        .context("error writing output file")?;

    println!("Results have been saved to {}", path.display());
    println!("Time taken:");
    println!("  Quickwit query: {query_elapsed:?}");
    println!("  Local processing: {process_elapsed:?}");
    println!("  Overall: {:?}", overall_start.elapsed());
    Ok(())
}
