//! Per-run sync result reporting
//!
//! One `SyncResult` per source per run, aggregated into a composite
//! `SyncReport`. Reports are ephemeral: logged, returned to the trigger,
//! and the latest one kept in memory for the status endpoint. Nothing is
//! persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feeds::SourceTag;

/// How one source's sync ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Ran and every record went through
    Clean,
    /// Ran, but some records were skipped or failed to store
    Partial,
    /// Feed absent this run; nothing attempted
    Skipped,
    /// Feed present but unusable; this source aborted
    Failed,
}

/// Outcome of one source's sync in one run
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub source: SourceTag,
    pub status: SourceStatus,
    /// Records mapped and offered to the reconciler
    pub processed: u64,
    /// Records that created or advanced an item
    pub changed: u64,
    /// Rows dropped for lacking the natural key
    pub missing_key: u64,
    /// Rows dropped as unparseable
    pub malformed: u64,
    /// Records skipped because no item existed and this source may not create
    pub unmatched: u64,
    /// Records whose store write failed
    pub store_errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub fn skipped(source: SourceTag) -> Self {
        Self {
            source,
            status: SourceStatus::Skipped,
            processed: 0,
            changed: 0,
            missing_key: 0,
            malformed: 0,
            unmatched: 0,
            store_errors: 0,
            error: None,
        }
    }

    pub fn failed(source: SourceTag, error: String) -> Self {
        Self {
            error: Some(error),
            status: SourceStatus::Failed,
            ..Self::skipped(source)
        }
    }

    /// Did this source avoid systemic failure? (Skipped counts as success.)
    pub fn succeeded(&self) -> bool {
        self.status != SourceStatus::Failed
    }

    /// One-line summary for the per-source log
    pub fn display_string(&self) -> String {
        match self.status {
            SourceStatus::Skipped => format!("{}: feed absent, skipped", self.source),
            SourceStatus::Failed => format!(
                "{}: failed ({})",
                self.source,
                self.error.as_deref().unwrap_or("unknown error")
            ),
            _ => format!(
                "{}: {} processed, {} changed ({} missing key, {} malformed, {} unmatched, {} store errors)",
                self.source,
                self.processed,
                self.changed,
                self.missing_key,
                self.malformed,
                self.unmatched,
                self.store_errors
            ),
        }
    }
}

/// Composite outcome of one orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub qpi: SyncResult,
    pub status: SyncResult,
    pub pim: SyncResult,
}

impl SyncReport {
    pub fn results(&self) -> [&SyncResult; 3] {
        [&self.qpi, &self.status, &self.pim]
    }

    /// No source hit a systemic failure
    pub fn all_succeeded(&self) -> bool {
        self.results().iter().all(|r| r.succeeded())
    }

    /// Overall status word for the composite log line
    pub fn overall(&self) -> &'static str {
        if self.results().iter().any(|r| r.status == SourceStatus::Failed) {
            "degraded"
        } else if self.results().iter().any(|r| r.status == SourceStatus::Partial) {
            "partial"
        } else {
            "ok"
        }
    }
}
