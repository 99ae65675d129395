//! Settings loading.
//!
//! Values come from an optional TOML file and are then overridden by the
//! environment (`.env` is loaded into the environment by `main`).

use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "lira-dashboard";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Window used by the metrics screen.
    #[serde(default = "default_metrics_days")]
    pub metrics_days: u32,

    /// Window used by the pending-by-client breakdown.
    #[serde(default = "default_dashboard_days")]
    pub dashboard_days: u32,

    /// Starting status filter for the task list: `"true"`, `"false"`, or empty for all.
    #[serde(default)]
    pub finished: String,
}

fn default_api_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout() -> u64 {
    20
}

fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join(APP_DIR).join("lira.log"))
        .unwrap_or_else(|| PathBuf::from("lira.log"))
}

fn default_metrics_days() -> u32 {
    3650
}

fn default_dashboard_days() -> u32 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            log_file: default_log_file(),
            metrics_days: default_metrics_days(),
            dashboard_days: default_dashboard_days(),
            finished: String::new(),
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies process environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("LIRA_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        Self::load_from(path.as_deref(), |name| env::var(name).ok())
    }

    pub fn load_from<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => Config::default(),
        };

        if let Some(url) = lookup("LIRA_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url;
        }
        if let Some(key) = lookup("LIRA_API_KEY").filter(|v| !v.trim().is_empty()) {
            config.api_key = Some(key);
        }
        if let Some(file) = lookup("LIRA_LOG_FILE").filter(|v| !v.trim().is_empty()) {
            config.log_file = PathBuf::from(file);
        }
        if let Some(raw) = lookup("LIRA_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    name: "LIRA_REQUEST_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
        }

        config.api_url = config.api_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
}
