//! Run scheduling and the overlap guard
//!
//! The scheduler state machine is Idle → Running → Idle, materialized as
//! an atomic `RunGuard` owned by the `SyncService` and shared by every
//! trigger path: the daily timer, the HTTP endpoint, and the CLI all go
//! through `try_run`, so two runs can never overlap. Stopping the
//! scheduler cancels the pending timer only; an in-flight run completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::orchestrator::SyncEngine;
use crate::report::SyncReport;

/// A sync run is already in progress
#[derive(Debug, Error, PartialEq, Eq)]
#[error("a sync run is already in progress")]
pub struct SyncBusy;

/// Atomic Idle/Running flag
#[derive(Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip Idle → Running; `None` when already running
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of one run; releases the guard on drop
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Guarded front door to the sync engine
///
/// Every trigger path funnels through here; the engine itself never sees
/// concurrent `run_once` calls.
#[derive(Clone)]
pub struct SyncService {
    engine: Arc<SyncEngine>,
    guard: RunGuard,
    last_report: Arc<RwLock<Option<SyncReport>>>,
}

impl SyncService {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            guard: RunGuard::new(),
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Run one sync now, unless a run is already in flight
    pub async fn try_run(&self) -> Result<SyncReport, SyncBusy> {
        let _permit = self.guard.try_acquire().ok_or(SyncBusy)?;
        let report = self.engine.run_once().await;
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// The shared run guard (for coordinating external triggers)
    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    /// Most recent composite report, if any run has completed
    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }
}

/// Delay from `now` until the next daily trigger time (UTC)
pub fn delay_until_next(now: DateTime<Utc>, daily_at: NaiveTime) -> std::time::Duration {
    let today = now.date_naive().and_time(daily_at).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

/// Recurring daily trigger
pub struct SyncScheduler {
    service: SyncService,
    daily_at: NaiveTime,
    cancel: CancellationToken,
}

impl SyncScheduler {
    pub fn new(service: SyncService, daily_at: NaiveTime) -> Self {
        Self {
            service,
            daily_at,
            cancel: CancellationToken::new(),
        }
    }

    /// Arm the recurring timer
    pub fn start(&self) -> JoinHandle<()> {
        let service = self.service.clone();
        let daily_at = self.daily_at;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                let delay = delay_until_next(Utc::now(), daily_at);
                info!(in_secs = delay.as_secs(), "Next scheduled sync armed");

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Sync scheduler stopped");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                // The run happens outside the select: stop() cancels only
                // the pending timer, never an in-flight run.
                match service.try_run().await {
                    Ok(report) => {
                        debug!(status = report.overall(), "Scheduled sync finished")
                    }
                    Err(SyncBusy) => {
                        warn!("Scheduled sync skipped: a run is already in progress")
                    }
                }
            }
        })
    }

    /// Cancel the pending timer
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
