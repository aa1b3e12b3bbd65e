//! Federation relay log ingestion daemon.
//!
//! Reads the relay's plaintext authentication log, parses each line into a
//! structured record, and ships batches to a Quickwit index. Existing file
//! contents are processed first; the daemon then follows the file for new
//! writes until interrupted.
//!
//! ```bash
//! # Run with the default properties file
//! roamlog-ingest
//!
//! # Override file and server from the command line
//! roamlog-ingest --config /etc/roamlog/src2index.properties \
//!     --logfile /var/log/relay/auth.log \
//!     --quickwit-url http://quickwit:7280
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use roamlog_core::{IngestSettings, Properties};
use roamlog_ingest::{IngestClient, StatsPoller, Tailer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Relay log to Quickwit ingestion daemon.
#[derive(Parser, Debug)]
#[command(name = "roamlog-ingest")]
#[command(about = "Tails the federation relay log and ships entries to Quickwit")]
#[command(version)]
struct Args {
    /// Path to the properties file
    #[arg(long, default_value = "src2index.properties")]
    config: PathBuf,

    /// Log file to process (overrides the config file value)
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Quickwit base URL (overrides the config file value)
    #[arg(long = "quickwit-url")]
    quickwit_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive"))
                .add_directive("roamlog_ingest=debug".parse().expect("valid directive")),
        )
        .init();

    let args = Args::parse();

    let mut props = Properties::load(&args.config)
        .with_context(|| format!("error loading configuration from {}", args.config.display()))?;
    if let Some(logfile) = &args.logfile {
        props.set("logFilePath", logfile.display().to_string());
    }
    if let Some(url) = &args.quickwit_url {
        props.set("quickwitURL", url.clone());
    }
    let settings =
        IngestSettings::from_properties(&props).context("invalid configuration")?;

    tracing::info!("roamlog-ingest starting");
    tracing::info!("  log file: {}", settings.log_file_path);
    tracing::info!("  quickwit: {}", settings.quickwit_url);
    tracing::info!("  batch size: {}", settings.batch_size);
    tracing::info!("  max retries: {}", settings.max_retries);

    let poller = StatsPoller::new(&settings).context("failed to create stats poller")?;
    tokio::spawn(poller.run());

    let client = IngestClient::new(&settings).context("failed to create ingest client")?;
    let tailer = Tailer::open(&settings.log_file_path, settings.batch_size, client)
        .with_context(|| format!("error opening log file {}", settings.log_file_path))?;

    tailer.run().await.context("error processing log file")?;
    Ok(())
}
