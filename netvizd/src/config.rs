//! Daemon settings, read from `config.json` in the data dir.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::DaemonError;

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A value plot added to every page, probing the object with uid `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    pub uid: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// How often each connection polls its component.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// JSON model description to serve.
    #[serde(default)]
    pub model: Option<PathBuf>,
    /// Fixed seed for default layout positions.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub plots: Vec<PlotConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            poll_interval_ms: default_poll_interval_ms(),
            model: None,
            seed: None,
            log_level: default_log_level(),
            plots: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Load from `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        if !path.exists() {
            info!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| DaemonError::Config {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
