//! Agent configuration loading.
//!
//! `agent.toml` under the storage root. A missing or malformed file yields
//! safe defaults with a warning; configuration problems never stop tracking.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::StorageConfig;

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";
const DEFAULT_APP_TYPE: &str = "view360";
const DEFAULT_INTERVAL_SECS: u64 = 30;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the remote service, trailing slash included.
    pub base_url: String,
    /// Application identifier sent in the login body and `apphit` header.
    pub app_type: String,
    /// Stable device identifier attached as the `deviceid` header.
    pub device_id: Option<String>,
    /// Foreground subscription cadence.
    pub foreground_interval_secs: u64,
    /// Background task cadence, configurable independently of the
    /// foreground cadence (e.g. coarser to save battery).
    pub background_interval_secs: u64,
    /// Minimum movement before a fix is delivered. 0 = time-based only.
    pub distance_filter_m: f64,
    /// Bound on every remote round-trip; background execution budgets are
    /// finite, so a ship call must never stall an invocation indefinitely.
    pub http_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_type: DEFAULT_APP_TYPE.to_string(),
            device_id: None,
            foreground_interval_secs: DEFAULT_INTERVAL_SECS,
            background_interval_secs: DEFAULT_INTERVAL_SECS,
            distance_filter_m: 0.0,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl AgentConfig {
    /// Loads the agent config, falling back to defaults when the file is
    /// absent or unreadable.
    pub fn load(storage: &StorageConfig) -> Self {
        let path = storage.config_file();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(err) => {
                warn!(error = %err, "Failed to read agent config; using defaults");
                return Self::default();
            }
        };

        match toml::from_str(&data) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "Agent config malformed; using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let config = AgentConfig::load(&StorageConfig::with_root(dir.path().to_path_buf()));
        assert_eq!(config.foreground_interval_secs, 30);
        assert_eq!(config.background_interval_secs, 30);
        assert_eq!(config.http_timeout_secs, 15);
        assert_eq!(config.app_type, "view360");
        assert!(config.device_id.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let storage = StorageConfig::with_root(dir.path().to_path_buf());
        std::fs::write(
            storage.config_file(),
            "base_url = \"https://tracker.example.com/api/\"\nbackground_interval_secs = 120\n",
        )
        .expect("write config");

        let config = AgentConfig::load(&storage);
        assert_eq!(config.base_url, "https://tracker.example.com/api/");
        assert_eq!(config.background_interval_secs, 120);
        assert_eq!(config.foreground_interval_secs, 30);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let storage = StorageConfig::with_root(dir.path().to_path_buf());
        std::fs::write(storage.config_file(), "base_url = [broken").expect("write config");
        let config = AgentConfig::load(&storage);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
