//! Sync trigger API handlers
//!
//! POST /sync/run, GET /sync/status

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::report::SyncReport;
use crate::AppState;

/// GET /sync/status response
#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    /// Is a run currently in flight?
    pub running: bool,
    /// Most recent composite report, if any run has completed
    pub last: Option<SyncReport>,
}

/// POST /sync/run
///
/// Run a full sync now and return the composite report. Rejected with
/// 409 Conflict while another run (scheduled or on-demand) is in flight;
/// overlapping runs are never started.
pub async fn run_sync(State(state): State<AppState>) -> ApiResult<Json<SyncReport>> {
    match state.sync.try_run().await {
        Ok(report) => {
            tracing::info!(status = report.overall(), "On-demand sync finished");
            Ok(Json(report))
        }
        Err(_busy) => Err(ApiError::Conflict(
            "a sync run is already in progress".to_string(),
        )),
    }
}

/// GET /sync/status
///
/// Report whether a run is in flight and the outcome of the latest run.
pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        running: state.sync.is_running(),
        last: state.sync.last_report().await,
    })
}

/// Build sync trigger routes
pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/sync/run", post(run_sync))
        .route("/sync/status", get(sync_status))
}
