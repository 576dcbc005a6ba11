//! Uploader configuration: defaults, then `config.toml`, then environment, then CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::timeouts;
use crate::url::BaseUrl;

pub const URL_ENV: &str = "FILEWAY_URL";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: timeouts::POLL_INTERVAL_MS,
            request_timeout_secs: timeouts::REQUEST_SECS,
        }
    }
}

impl Config {
    /// Full layering for the binary
    pub fn load(cli_url: Option<&str>) -> Result<Self> {
        let mut cfg = Self::from_file(&config_path())?;
        cfg.apply_overrides(std::env::var(URL_ENV).ok().as_deref(), cli_url);
        Ok(cfg)
    }

    /// Missing file yields defaults; a malformed one is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => toml::from_str(&data)
                .with_context(|| format!("Failed to parse config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read config file {}", path.display()))
            }
        }
    }

    /// Later sources win: environment, then command line
    pub fn apply_overrides(&mut self, env_url: Option<&str>, cli_url: Option<&str>) {
        if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.to_string();
        }
        if let Some(url) = cli_url {
            self.base_url = url.to_string();
        }
    }

    pub fn base_url(&self) -> Result<BaseUrl> {
        Ok(BaseUrl::parse(&self.base_url)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn home_dir() -> PathBuf {
    #[cfg(windows)]
    {
        if let Ok(profile) = std::env::var("USERPROFILE") {
            return PathBuf::from(profile);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home);
    }
    PathBuf::from(".")
}

pub fn config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("Fileway");
        }
    }
    // Unix-like default
    home_dir().join(".config").join("fileway")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
