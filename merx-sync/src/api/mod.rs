//! HTTP API handlers for merx-sync
//!
//! The trigger surface of the sync engine: health, on-demand run, and
//! the status of the most recent run.

pub mod health;
pub mod sync;

pub use health::health_routes;
pub use sync::sync_routes;
