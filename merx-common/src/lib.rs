//! # Merx Common Library
//!
//! Shared code for the merx catalog services:
//! - Error types
//! - Configuration loading and data folder resolution
//! - Database initialization and the item store

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
