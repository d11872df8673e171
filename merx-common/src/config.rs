//! Configuration loading and data folder resolution
//!
//! Services resolve their settings in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MERX_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. "info" or "merx_sync=debug"
    pub level: Option<String>,
}

/// Feed locations section of the TOML config
///
/// Any feed may be left unconfigured; an unconfigured or missing feed is a
/// recoverable condition at sync time, never a startup failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Path to the QPI validation extract (CSV)
    pub qpi_feed: Option<String>,
    /// Directory holding dated marketplace status snapshots (TSV)
    pub status_snapshot_dir: Option<String>,
    /// Path to the PIM extract workbook (XLSX)
    pub pim_extract: Option<String>,
}

/// Sync scheduling section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSection {
    /// Daily trigger time, "HH:MM" in UTC
    pub daily_at: Option<String>,
    /// HTTP bind address for the trigger API
    pub bind: Option<String>,
}

/// TOML configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the shared merx.db
    pub data_dir: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub sync: SyncSection,
}

/// Load the TOML config file
///
/// An explicitly requested file must exist and parse; the default file is
/// optional and falls back to compiled defaults when absent.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(TomlConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read config {}: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Cannot parse config {}: {}", path.display(), e)))?;

    tracing::debug!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("merx").join("merx-sync.toml"))
}

/// Resolve the data folder
pub fn resolve_data_dir(cli_arg: Option<&str>, toml: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("MERX_DATA_DIR") {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml.data_dir {
        return PathBuf::from(path);
    }

    // Priority 4: OS-dependent compiled default
    default_data_dir()
}

/// OS-dependent default data folder path
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("merx"))
        .unwrap_or_else(|| PathBuf::from("./merx_data"))
}

/// Create the data folder if missing and return the database path inside it
pub fn ensure_data_dir(data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| Error::Config(format!("Cannot create data dir {}: {}", data_dir.display(), e)))?;
    Ok(data_dir.join("merx.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_partial_toml_parses_with_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            data_dir = "/srv/merx"

            [feeds]
            qpi_feed = "/srv/feeds/qpi.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir.as_deref(), Some("/srv/merx"));
        assert_eq!(config.feeds.qpi_feed.as_deref(), Some("/srv/feeds/qpi.csv"));
        assert!(config.feeds.status_snapshot_dir.is_none());
        assert!(config.sync.daily_at.is_none());
        assert!(config.logging.level.is_none());
    }

    #[test]
    #[serial]
    fn test_data_dir_cli_beats_env_and_toml() {
        std::env::set_var("MERX_DATA_DIR", "/from/env");
        let toml = TomlConfig {
            data_dir: Some("/from/toml".to_string()),
            ..Default::default()
        };

        assert_eq!(
            resolve_data_dir(Some("/from/cli"), &toml),
            PathBuf::from("/from/cli")
        );
        assert_eq!(resolve_data_dir(None, &toml), PathBuf::from("/from/env"));

        std::env::remove_var("MERX_DATA_DIR");
        assert_eq!(resolve_data_dir(None, &toml), PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let result = load_toml_config(Some(Path::new("/nonexistent/merx-sync.toml")));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_ensure_data_dir_creates_and_returns_db_path() {
        let temp = tempfile::tempdir().unwrap();
        let data_dir = temp.path().join("nested").join("merx");

        let db_path = ensure_data_dir(&data_dir).unwrap();
        assert!(data_dir.is_dir());
        assert!(db_path.ends_with("merx.db"));
    }
}
