//! Ingestion pipeline for the federation relay log.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   write events   ┌──────────┐
//! │ relay log  │ ───────────────▶ │  Tailer  │  catch-up, then follow
//! └────────────┘                  └────┬─────┘
//!                                      │ parsed LogEntry
//!                                      ▼
//!                                 ┌──────────┐
//!                                 │ Batcher  │  bounded, source order
//!                                 └────┬─────┘
//!                                      │ batches
//!                                      ▼
//!                              ┌──────────────┐
//!                              │ IngestClient │  NDJSON POST, retry, 413 split
//!                              └──────────────┘
//! ```
//!
//! A [`StatsPoller`] runs beside the tailer and reports Quickwit's own
//! per-index document counters, which is where doc-mapper rejections become
//! visible.

pub mod batcher;
pub mod client;
pub mod error;
pub mod stats;
pub mod tailer;

pub use batcher::Batcher;
pub use client::IngestClient;
pub use error::{Error, Result};
pub use stats::{parse_indexer_stats, IndexerStats, StatsPoller};
pub use tailer::Tailer;
