//! Log file tailer.
//!
//! The tailer runs in two phases. The catch-up phase reads the whole file
//! from the start, parsing each line, batching, and flushing to the ingest
//! client; the end-of-file offset is then remembered. The tail phase
//! registers a filesystem watch on the file and, on every write event,
//! reads from the stored offset to the new end of file through exactly the
//! same parse/batch/flush path.
//!
//! No offset is persisted across restarts: a restarted daemon re-tails from
//! the beginning and relies on the index to tolerate duplicates.

use crate::batcher::Batcher;
use crate::client::IngestClient;
use crate::error::Result;
use notify::Config as NotifyConfig;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use roamlog_core::parse_line;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Tails one log file and ships parsed entries via an [`IngestClient`].
pub struct Tailer {
    path: PathBuf,
    file: File,
    offset: u64,
    batch_size: usize,
    client: IngestClient,

    lines_seen: u64,
    parse_errors: u64,
    entries_sent: u64,
    batches_failed: u64,
}

impl Tailer {
    pub fn open(path: impl Into<PathBuf>, batch_size: usize, client: IngestClient) -> Result<Tailer> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Tailer {
            path,
            file,
            offset: 0,
            batch_size,
            client,
            lines_seen: 0,
            parse_errors: 0,
            entries_sent: 0,
            batches_failed: 0,
        })
    }

    /// Catch up with existing file contents, then follow changes until the
    /// process is interrupted or the watch channel closes.
    pub async fn run(mut self) -> Result<()> {
        info!("processing existing data from {}", self.path.display());
        self.catch_up().await?;

        let (tx, mut rx) = mpsc::channel::<notify::Result<notify::Event>>(256);
        let mut watcher = RecommendedWatcher::new(
            move |event| {
                // The watcher runs on its own thread; a full channel just
                // coalesces events, which the offset logic absorbs.
                let _ = tx.blocking_send(event);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        info!("watching for file changes...");

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("shutdown signal received, stopping");
                    break;
                }
                event = rx.recv() => match event {
                    None => {
                        info!("watch channel closed, stopping");
                        break;
                    }
                    Some(Ok(event)) if matches!(event.kind, EventKind::Modify(_)) => {
                        if let Err(err) = self.drain_new().await {
                            warn!("error processing new data: {err}");
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => warn!("watch error: {err}"),
                }
            }
        }

        info!(
            "tailer stopped: {} lines, {} parse errors, {} entries sent, {} batches failed",
            self.lines_seen, self.parse_errors, self.entries_sent, self.batches_failed
        );
        Ok(())
    }

    /// Read the whole file once and remember the end-of-file offset.
    async fn catch_up(&mut self) -> Result<()> {
        self.offset = 0;
        self.read_to_eof().await?;
        info!(
            "finished processing existing log data. Total lines: {}, Errors: {}",
            self.lines_seen, self.parse_errors
        );
        Ok(())
    }

    /// Read from the stored offset to the current end of file.
    async fn drain_new(&mut self) -> Result<()> {
        self.read_to_eof().await
    }

    async fn read_to_eof(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(&mut self.file);
        let mut batcher = Batcher::new(self.batch_size);
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let raw = line.trim_end_matches(['\n', '\r']);
            if raw.is_empty() {
                continue;
            }
            self.lines_seen += 1;

            match parse_line(raw) {
                Ok(entry) => {
                    if let Some(batch) = batcher.push(entry) {
                        Self::flush(
                            &self.client,
                            &batch,
                            &mut self.entries_sent,
                            &mut self.batches_failed,
                        )
                        .await;
                    }
                }
                Err(err) => {
                    warn!("error parsing line {}: {err}: {raw}", self.lines_seen);
                    self.parse_errors += 1;
                }
            }
        }

        if let Some(batch) = batcher.drain() {
            Self::flush(
                &self.client,
                &batch,
                &mut self.entries_sent,
                &mut self.batches_failed,
            )
            .await;
        }

        drop(reader);
        self.offset = self.file.stream_position()?;
        Ok(())
    }

    /// Deliver one batch; a terminal transport failure loses the batch but
    /// never the tail loop.
    async fn flush(
        client: &IngestClient,
        batch: &[roamlog_core::LogEntry],
        entries_sent: &mut u64,
        batches_failed: &mut u64,
    ) {
        match client.send(batch).await {
            Ok(delivered) => *entries_sent += delivered as u64,
            Err(err) => {
                warn!("error sending batch of {}: {err}", batch.len());
                *batches_failed += 1;
            }
        }
    }
}
