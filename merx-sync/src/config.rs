//! Configuration resolution for merx-sync
//!
//! Every setting resolves ENV → TOML → compiled default, with feed
//! locations defaulting to a `feeds/` folder inside the data directory.
//! A feed path that resolves to something that does not exist is fine:
//! absence is detected per run, never at startup.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use merx_common::config::TomlConfig;
use merx_common::{Error, Result};

use crate::orchestrator::FeedPaths;

const DEFAULT_DAILY_AT: &str = "02:15";
const DEFAULT_BIND: &str = "127.0.0.1:5740";

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_path: PathBuf,
    pub bind_addr: String,
    /// Daily trigger time, UTC
    pub daily_at: NaiveTime,
    pub feeds: FeedPaths,
}

impl SyncConfig {
    /// Resolve the service configuration against a loaded TOML config and
    /// the already-resolved data directory
    pub fn resolve(toml: &TomlConfig, data_dir: &Path, database_path: PathBuf) -> Result<Self> {
        let feeds_dir = data_dir.join("feeds");

        let feeds = FeedPaths {
            qpi_feed: resolve_path(
                "MERX_QPI_FEED",
                toml.feeds.qpi_feed.as_deref(),
                feeds_dir.join("qpi.csv"),
            ),
            status_snapshot_dir: resolve_path(
                "MERX_STATUS_SNAPSHOT_DIR",
                toml.feeds.status_snapshot_dir.as_deref(),
                feeds_dir.join("status"),
            ),
            pim_extract: resolve_path(
                "MERX_PIM_EXTRACT",
                toml.feeds.pim_extract.as_deref(),
                feeds_dir.join("pim.xlsx"),
            ),
        };

        let daily_at_raw = resolve_string(
            "MERX_SYNC_DAILY_AT",
            toml.sync.daily_at.as_deref(),
            DEFAULT_DAILY_AT,
        );
        let daily_at = NaiveTime::parse_from_str(&daily_at_raw, "%H:%M").map_err(|_| {
            Error::Config(format!(
                "Invalid sync.daily_at {:?}: expected HH:MM (24h, UTC)",
                daily_at_raw
            ))
        })?;

        let bind_addr = resolve_string("MERX_BIND", toml.sync.bind.as_deref(), DEFAULT_BIND);

        Ok(Self {
            database_path,
            bind_addr,
            daily_at,
            feeds,
        })
    }
}

fn resolve_string(env_key: &str, toml_value: Option<&str>, default: &str) -> String {
    if let Ok(value) = std::env::var(env_key) {
        return value;
    }
    toml_value.unwrap_or(default).to_string()
}

fn resolve_path(env_key: &str, toml_value: Option<&str>, default: PathBuf) -> PathBuf {
    if let Ok(value) = std::env::var(env_key) {
        return PathBuf::from(value);
    }
    toml_value.map(PathBuf::from).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn resolve(toml: &TomlConfig) -> SyncConfig {
        let data_dir = Path::new("/data/merx");
        SyncConfig::resolve(toml, data_dir, data_dir.join("merx.db")).unwrap()
    }

    #[test]
    #[serial]
    fn test_defaults_land_inside_data_dir() {
        let config = resolve(&TomlConfig::default());

        assert_eq!(config.feeds.qpi_feed, PathBuf::from("/data/merx/feeds/qpi.csv"));
        assert_eq!(
            config.feeds.status_snapshot_dir,
            PathBuf::from("/data/merx/feeds/status")
        );
        assert_eq!(config.feeds.pim_extract, PathBuf::from("/data/merx/feeds/pim.xlsx"));
        assert_eq!(config.daily_at, NaiveTime::from_hms_opt(2, 15, 0).unwrap());
        assert_eq!(config.bind_addr, DEFAULT_BIND);
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        let mut toml = TomlConfig::default();
        toml.feeds.qpi_feed = Some("/from/toml/qpi.csv".to_string());
        toml.sync.daily_at = Some("23:45".to_string());

        std::env::set_var("MERX_QPI_FEED", "/from/env/qpi.csv");
        let config = resolve(&toml);
        std::env::remove_var("MERX_QPI_FEED");

        assert_eq!(config.feeds.qpi_feed, PathBuf::from("/from/env/qpi.csv"));
        assert_eq!(config.daily_at, NaiveTime::from_hms_opt(23, 45, 0).unwrap());
    }

    #[test]
    #[serial]
    fn test_invalid_daily_at_is_a_config_error() {
        let mut toml = TomlConfig::default();
        toml.sync.daily_at = Some("2:15am".to_string());

        let result = SyncConfig::resolve(&toml, Path::new("/data"), PathBuf::from("/data/merx.db"));
        assert!(result.is_err());
    }
}
