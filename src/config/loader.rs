//! Configuration loader for Elevated-Launcher
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::ConfigDefaults;
use crate::launcher::AnchorSelection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anchor: AnchorConfig,

    #[serde(default)]
    pub launch: LaunchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which process supplies the interactive user's identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorConfig {
    #[serde(default = "default_anchor_process")]
    pub process_name: String,
    #[serde(default = "default_anchor_selection")]
    pub selection: AnchorSelection,
}

/// How the child is started and supervised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default = "default_inherit_environment")]
    pub inherit_environment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<String>,
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_kill_on_timeout")]
    pub kill_on_timeout: bool,
}

impl LaunchConfig {
    /// `None` means wait indefinitely
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults when the file is missing.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new(ConfigDefaults::CONFIG_FILE).load_or_default()
}

// Default functions for serde
fn default_anchor_process() -> String {
    ConfigDefaults::ANCHOR_PROCESS.to_string()
}

fn default_anchor_selection() -> AnchorSelection {
    ConfigDefaults::ANCHOR_SELECTION
}

fn default_inherit_environment() -> bool {
    ConfigDefaults::INHERIT_ENVIRONMENT
}

fn default_wait_timeout_ms() -> u64 {
    ConfigDefaults::WAIT_TIMEOUT_MS
}

fn default_kill_on_timeout() -> bool {
    ConfigDefaults::KILL_ON_TIMEOUT
}

fn default_log_level() -> String {
    ConfigDefaults::LOG_LEVEL.to_string()
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig {
            process_name: default_anchor_process(),
            selection: default_anchor_selection(),
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LaunchConfig {
            inherit_environment: default_inherit_environment(),
            desktop: None,
            wait_timeout_ms: default_wait_timeout_ms(),
            kill_on_timeout: default_kill_on_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}
