//! merx-sync library interface
//!
//! The multi-source reconciliation sync engine of the merx catalog suite:
//! pulls item facts from the QPI validation extract, the marketplace
//! status snapshot, and the PIM extract, and merges them into the
//! canonical item store keyed by SKU.

pub mod api;
pub mod config;
pub mod error;
pub mod feeds;
pub mod mapper;
pub mod orchestrator;
pub mod reconciler;
pub mod report;
pub mod scheduler;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::scheduler::SyncService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared catalog database pool
    pub db: SqlitePool,
    /// Guarded sync trigger
    pub sync: SyncService,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, sync: SyncService) -> Self {
        Self {
            db,
            sync,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::sync_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
