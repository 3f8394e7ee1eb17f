//! Paths and runtime configuration.
//!
//! Everything lives in one data directory:
//!
//! ```text
//! <data_dir>/
//! ├── state.json    # Session State record (absent when nothing runs)
//! ├── state.lock    # flock target serializing writers
//! ├── config.toml   # optional overrides, see [`Config`]
//! └── daemon.log    # tracing output of every cc-presence process
//! ```
//!
//! `CC_PRESENCE_DATA_DIR` overrides the location (tests rely on this).

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PresenceError, Result};

pub const DATA_DIR_ENV: &str = "CC_PRESENCE_DATA_DIR";
pub const CLIENT_ID_ENV: &str = "CC_PRESENCE_CLIENT_ID";
pub const DATA_DIR_NAME: &str = "cc-discord-rpc";
pub const STATE_FILE: &str = "state.json";
pub const LOCK_FILE: &str = "state.lock";
pub const CONFIG_FILE: &str = "config.toml";
pub const LOG_FILE: &str = "daemon.log";

/// Discord application registered for the Claude Code card.
pub const DEFAULT_CLIENT_ID: &str = "1330919293709324449";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 15 * 60;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
/// Discord accepts roughly five activity updates per 20 seconds.
pub const DEFAULT_MIN_UPDATE_INTERVAL_SECS: u64 = 4;

pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .ok_or(PresenceError::DataDirNotFound)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client_id: String,
    pub idle_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub min_update_interval_secs: u64,
    pub large_image: Option<String>,
    pub large_text: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            min_update_interval_secs: DEFAULT_MIN_UPDATE_INTERVAL_SECS,
            large_image: Some("claude".to_string()),
            large_text: Some("Claude Code".to_string()),
        }
    }
}

impl Config {
    /// Loads `<data_dir>/config.toml`, returning defaults if it doesn't exist.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = fs_err::read_to_string(&path)
                .map_err(|err| PresenceError::io("Failed to read config", err))?;
            toml::from_str::<Config>(&content).map_err(|err| PresenceError::ConfigMalformed {
                path: path.clone(),
                details: err.to_string(),
            })?
        } else {
            Config::default()
        };

        if let Ok(client_id) = env::var(CLIENT_ID_ENV) {
            if !client_id.trim().is_empty() {
                config.client_id = client_id.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn min_update_interval(&self) -> Duration {
        Duration::from_secs(self.min_update_interval_secs)
    }
}
