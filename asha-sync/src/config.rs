//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// Default name of the persisted state record
pub const DEFAULT_STORAGE_KEY: &str = "asha-ai-storage";

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// REST API base URL, including the version prefix
    pub api_base_url: String,
    /// Bearer token for the API
    pub auth_token: Option<String>,
    /// Per-request timeout (seconds); a timeout counts as a network failure
    pub request_timeout_secs: u64,
    /// Failed replays of an application error before dead-lettering
    pub max_retries: u32,
    /// Periodic refresh interval for the health-worker role (seconds)
    pub poll_interval_secs: u64,
    /// Connectivity probe interval used by the CLI (seconds)
    pub probe_interval_secs: u64,
    /// SQLite file holding the persisted state
    pub state_db_path: String,
    /// Name of the persisted state record
    pub storage_key: String,
    /// Connectivity assumed at startup
    pub start_online: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            auth_token: None,
            request_timeout_secs: 30,
            max_retries: 5,
            poll_interval_secs: 30,
            probe_interval_secs: 10,
            state_db_path: "asha-sync.db".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            start_online: true,
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// The health endpoint lives at the server root, outside the API prefix.
    pub fn health_url(&self) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        let root = base.strip_suffix("/api/v1").unwrap_or(base);
        format!("{}/health", root)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        if self.max_retries == 0 {
            return Err(SyncError::Config("max_retries must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 || self.poll_interval_secs == 0 || self.probe_interval_secs == 0 {
            return Err(SyncError::Config("intervals and timeouts must be non-zero".to_string()));
        }
        if self.storage_key.is_empty() {
            return Err(SyncError::Config("storage_key must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.storage_key, "asha-ai-storage");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_health_url_strips_api_prefix() {
        let config = SyncConfig {
            api_base_url: "https://api.example.org/api/v1/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.health_url(), "https://api.example.org/health");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"api_base_url": "http://10.0.0.2:8000/api/v1", "max_retries": 3}"#)
                .unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.start_online);
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = SyncConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }
}
