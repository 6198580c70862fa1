use crate::error::{Result, SetupError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub setup: SetupConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SetupConfig {
    /// Directory downloads, checks and extraction targets are relative to
    pub work_dir: Option<PathBuf>,
    /// JSON dependency table replacing the embedded one
    pub deps_file: Option<PathBuf>,
    /// Platform name overriding the running OS
    pub platform: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DownloadConfig {
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

// Default value functions
fn default_user_agent() -> String {
    concat!("sdk-setup/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_true() -> bool {
    true
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: default_user_agent(),
            show_progress: default_true(),
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| SetupError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SetupError::Config(e.to_string()))
    }
}

/// `$XDG_CONFIG_HOME/sdk-setup/config.toml` or the platform equivalent
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sdk-setup").join("config.toml"))
}
