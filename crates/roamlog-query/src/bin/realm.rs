//! Accept-by-realm analysis tool.
//!
//! Aggregates Access-Accept events for a realm's users over a time window
//! and writes a JSON report of who was active, on how many days, and at
//! which service providers.
//!
//! ```bash
//! roamlog-realm ku.ac.th 30        # last 30 days
//! roamlog-realm etlr1 14-10-2024   # one specific date
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use roamlog_core::QuickwitAuth;
use roamlog_query::{
    build_realm_report, parse_realm_window, realm_query, resolve_realm_domain, run_realm_query,
    write_report, SearchClient, WindowLabel,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Aggregates Access-Accept events for a realm's users.
#[derive(Parser, Debug)]
#[command(name = "roamlog-realm")]
#[command(about = "Aggregates Access-Accept events for users of a realm")]
#[command(version)]
struct Args {
    /// Domain to search (e.g. 'ku.ac.th', 'etlr1', 'etlr2')
    domain: String,

    /// Days to look back (1-366) or a specific date as DD-MM-YYYY
    #[arg(value_name = "DAYS|DD-MM-YYYY")]
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

    let window = parse_realm_window(args.window.as_deref())
        .context("usage: roamlog-realm <domain> [days|DD-MM-YYYY]")?;
    let domain = resolve_realm_domain(&args.domain);
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
    let (result, stats) = run_realm_query(client, realm_query(&domain), &window)
        .await
        .context("query run failed")?;
    let query_elapsed = query_start.elapsed();

    println!();
    println!("Total hits: {}", stats.total_hits);
    println!("Number of users: {}", result.users.len());
    println!("Number of providers: {}", result.providers.len());

    let process_start = Instant::now();
    let report = build_realm_report(&result, &domain, &window);
    let process_elapsed = process_start.elapsed();

    let dir_name = domain.replace('.', "-");
    let path = write_report(&args.output, &dir_name, &window.label, false, &report)
        .context("error writing output file")?;

    println!("Results have been saved to {}", path.display());
    println!("Time taken:");
    println!("  Quickwit query: {query_elapsed:?}");
    println!("  Local processing: {process_elapsed:?}");
    println!("  Overall: {:?}", overall_start.elapsed());
    Ok(())
}
