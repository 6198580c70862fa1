//! Configuration module for sdk-setup
//!
//! Loads config from `$XDG_CONFIG_HOME/sdk-setup/config.toml` or `~/.config/sdk-setup/config.toml`.
//! Falls back to defaults if the file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//! Command-line flags take precedence over anything set here.
//!
//! # Example
//!
//! ```no_run
//! use sdk_setup::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Download timeout: {:?}", config.download.timeout_secs);
//! ```

pub mod schema;

pub use schema::{default_config_path, Config, DownloadConfig, SetupConfig};
