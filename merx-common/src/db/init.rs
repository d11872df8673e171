//! Database initialization
//!
//! Opens (or creates) the shared merx.db and creates the tables this
//! service relies on. Table creation is idempotent; the sync engine issues
//! no other schema migrations.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while the sync engine writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Wait out short lock contention with the CRUD API instead of erroring
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_items_table(&pool).await?;

    Ok(pool)
}

/// Create the canonical items table
///
/// `sku` is the natural key: the sole join key across all sync sources.
/// Stage flags default to 0 and only ever advance to 1.
pub async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            sku TEXT PRIMARY KEY,
            name TEXT,
            brand TEXT,
            legal_name TEXT,
            upc TEXT,
            length_in REAL,
            width_in REAL,
            height_in REAL,
            weight_lb REAL,
            marketplace_id TEXT,
            ordered INTEGER NOT NULL DEFAULT 0,
            vendor_setup INTEGER NOT NULL DEFAULT 0,
            listed INTEGER NOT NULL DEFAULT 0,
            finalized INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
