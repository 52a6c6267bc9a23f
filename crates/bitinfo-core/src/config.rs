//! Application configuration management.
//!
//! Configuration is stored at `~/.config/bitinfo/config.json`. Session
//! snapshots live under the data directory unless `store_dir` overrides it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{SessionOptions, DEFAULT_MAX_WEEKS};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "bitinfo";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session snapshots directory under the data dir
const SESSIONS_DIR: &str = "sessions";

fn default_max_weeks() -> u32 {
    DEFAULT_MAX_WEEKS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub last_username: Option<String>,
    /// Per-request timeout; none means the transport never gives up
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_max_weeks")]
    pub max_weeks: u32,
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_username: None,
            request_timeout_secs: None,
            max_weeks: DEFAULT_MAX_WEEKS,
            store_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSIONS_DIR))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            max_weeks: self.max_weeks,
        }
    }
}
