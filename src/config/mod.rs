//! Configuration and token file location

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::revoke::DEFAULT_REVOKE_URL;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
const DEFAULT_STATUS_RESET_SECS: u64 = 3;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the authorization backend (serves /auth/url, /auth/callback, /auth/refresh)
    pub backend_url: String,
    /// Provider token revocation endpoint
    pub revoke_url: String,
    /// Seconds a refresh/revoke result stays visible before clearing
    pub status_reset_secs: u64,
    /// Token file override (defaults to the platform data directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            revoke_url: DEFAULT_REVOKE_URL.to_string(),
            status_reset_secs: DEFAULT_STATUS_RESET_SECS,
            tokens_path: None,
        }
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "token-cli", "token-cli")
            .context("Could not determine config directory")
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory for token storage and the TUI log file
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;
        Ok(path)
    }

    /// Where the token collection is persisted
    pub fn tokens_path(&self) -> Result<PathBuf> {
        match &self.tokens_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("tokens.json")),
        }
    }

    pub fn status_reset(&self) -> Duration {
        Duration::from_secs(self.status_reset_secs)
    }
}
