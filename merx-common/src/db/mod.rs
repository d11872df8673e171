//! Database access for merx services
//!
//! Shared SQLite database holding the canonical item catalog. The sync
//! engine is one writer among several; the CRUD API mutates the same rows.

pub mod init;
pub mod items;

pub use init::init_database;
