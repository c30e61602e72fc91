//! Configuration management for the relay CLI.
//!
//! Configuration is loaded with precedence:
//! 1. `--config <PATH>` / `RELAY_CONFIG`
//! 2. Config file (`<data dir>/config.toml`)
//! 3. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use relay_core::RelayConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Relay tunables
    #[serde(default)]
    pub relay: RelayConfig,

    /// External command used as the relay's dependency
    #[serde(default)]
    pub dependency: DependencyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Program to run for every call
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the call input
    #[serde(default)]
    pub args: Vec<String>,

    /// Strip surrounding whitespace from the program's output
    #[serde(default = "default_true")]
    pub trim_output: bool,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            trim_output: default_true(),
        }
    }
}

// Default value functions
fn default_program() -> String {
    "echo".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "relay", "relay") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".relay")
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.relay.validate().context("Invalid [relay] section")?;

        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RELAY_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
