//! Sync orchestration
//!
//! Runs the three source pipelines independently and aggregates the
//! composite report. Each pipeline is: blocking reader on the I/O thread
//! pool → bounded channel → async map + upsert loop. One source failing,
//! missing, or limping never prevents the other two from completing.

use std::path::PathBuf;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::feeds::{FeedError, FeedReader, PimReader, QpiReader, RawRecord, SourceTag, StatusReader};
use crate::mapper::map_record;
use crate::reconciler::{Reconciler, UpsertOutcome};
use crate::report::{SourceStatus, SyncReport, SyncResult};

/// Bounded hand-off between a feed's blocking reader and the async
/// reconciliation loop; keeps a fast reader from buffering a whole feed.
const RECORD_CHANNEL_CAPACITY: usize = 256;

/// Resolved feed locations for one engine instance
#[derive(Debug, Clone)]
pub struct FeedPaths {
    /// QPI validation extract (CSV file)
    pub qpi_feed: PathBuf,
    /// Marketplace status snapshot directory
    pub status_snapshot_dir: PathBuf,
    /// PIM extract workbook (XLSX file)
    pub pim_extract: PathBuf,
}

/// Messages from a feed's blocking producer to its async consumer
enum FeedItem {
    /// Feed absent this run
    Absent,
    /// Feed present but unusable; source aborts
    Fatal(String),
    /// One raw row (or one row-level parse failure)
    Record(Result<RawRecord, FeedError>),
}

/// The multi-source reconciliation sync engine
pub struct SyncEngine {
    reconciler: Reconciler,
    feeds: FeedPaths,
}

impl SyncEngine {
    pub fn new(db: SqlitePool, feeds: FeedPaths) -> Self {
        Self {
            reconciler: Reconciler::new(db),
            feeds,
        }
    }

    /// Run one full sync across all three sources
    ///
    /// Never fails: every failure mode degrades to a reported per-source
    /// outcome. Feeds are located fresh on every call.
    pub async fn run_once(&self) -> SyncReport {
        let started_at = Utc::now();
        info!("Catalog sync run starting");

        let (qpi, status, pim) = tokio::join!(
            self.sync_source(Box::new(QpiReader::new(&self.feeds.qpi_feed))),
            self.sync_source(Box::new(StatusReader::new(&self.feeds.status_snapshot_dir))),
            self.sync_source(Box::new(PimReader::new(&self.feeds.pim_extract))),
        );

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            qpi,
            status,
            pim,
        };

        info!(
            status = report.overall(),
            duration_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Catalog sync run complete"
        );

        report
    }

    /// Run one source's pipeline to completion
    async fn sync_source(&self, reader: Box<dyn FeedReader>) -> SyncResult {
        let source = reader.source();
        let (tx, mut rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);

        let producer = tokio::task::spawn_blocking(move || produce_records(reader, tx));

        let mut counters = Counters::default();
        let mut result = None;

        while let Some(item) = rx.recv().await {
            match item {
                FeedItem::Absent => {
                    result = Some(SyncResult::skipped(source));
                    break;
                }
                FeedItem::Fatal(detail) => {
                    warn!(source = %source, error = %detail, "Source sync aborted");
                    result = Some(SyncResult::failed(source, detail));
                    break;
                }
                FeedItem::Record(Err(e)) => {
                    debug!(source = %source, error = %e, "Skipping malformed record");
                    counters.malformed += 1;
                }
                FeedItem::Record(Ok(raw)) => match map_record(source, &raw) {
                    None => counters.missing_key += 1,
                    Some(mapped) => {
                        counters.processed += 1;
                        match self
                            .reconciler
                            .upsert(&mapped.sku, &mapped.patch, source)
                            .await
                        {
                            Ok(outcome) => {
                                if outcome.changed() {
                                    counters.changed += 1;
                                }
                                if outcome == UpsertOutcome::Unmatched {
                                    counters.unmatched += 1;
                                }
                            }
                            Err(e) => {
                                warn!(source = %source, sku = %mapped.sku, error = %e,
                                      "Store write failed; continuing with next record");
                                counters.store_errors += 1;
                            }
                        }
                    }
                },
            }
        }

        // Dropping the receiver unblocks a still-running producer; join it
        // so its thread is done before we report.
        drop(rx);
        let _ = producer.await;

        let result = result.unwrap_or_else(|| counters.into_result(source));
        info!("{}", result.display_string());
        result
    }
}

/// Blocking half of one source pipeline: locate, open, stream rows
fn produce_records(reader: Box<dyn FeedReader>, tx: mpsc::Sender<FeedItem>) {
    let source = reader.source();

    let handle = match reader.locate() {
        Ok(Some(handle)) => handle,
        Ok(None) => {
            let _ = tx.blocking_send(FeedItem::Absent);
            return;
        }
        Err(e) => {
            let _ = tx.blocking_send(FeedItem::Fatal(e.to_string()));
            return;
        }
    };

    debug!(source = %source, path = %handle.path.display(), "Reading feed snapshot");

    let stream = match reader.read(&handle) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.blocking_send(FeedItem::Fatal(e.to_string()));
            return;
        }
    };

    for row in stream {
        if tx.blocking_send(FeedItem::Record(row)).is_err() {
            // Consumer gone (source aborted); stop reading
            break;
        }
    }
}

#[derive(Default)]
struct Counters {
    processed: u64,
    changed: u64,
    missing_key: u64,
    malformed: u64,
    unmatched: u64,
    store_errors: u64,
}

impl Counters {
    fn into_result(self, source: SourceTag) -> SyncResult {
        let status = if self.malformed + self.store_errors > 0 {
            SourceStatus::Partial
        } else {
            SourceStatus::Clean
        };

        SyncResult {
            source,
            status,
            processed: self.processed,
            changed: self.changed,
            missing_key: self.missing_key,
            malformed: self.malformed,
            unmatched: self.unmatched,
            store_errors: self.store_errors,
            error: None,
        }
    }
}
