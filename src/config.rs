//! Configuration for the notifier daemon
//!
//! Loads settings from TOML file at `~/.config/hook-notifier/config.toml`.
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::focus::FocusOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub focus: FocusConfig,
    pub cards: CardsConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, creating it with defaults when missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            // Auto-generate default config file
            if let Err(e) = Self::save_default(config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Directory holding all notifier configuration
    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Failed to get config directory")?
            .join("hook-notifier"))
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path of the focus mapping JSON, honouring the override
    pub fn mapping_path(&self) -> Result<PathBuf> {
        match &self.focus.mapping_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("focus-mapping.json")),
        }
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let default_config = Self::default();
        let toml_string = toml::to_string_pretty(&default_config)
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string)
            .context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Focus subsystem configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Maximum focus requests running at once
    pub max_concurrent: usize,
    /// Delay between activation steps (milliseconds)
    pub settle_ms: u64,
    /// Deadline for `xdotool search` (milliseconds)
    pub search_timeout_ms: u64,
    /// Deadline for a single title lookup (milliseconds)
    pub title_timeout_ms: u64,
    /// Deadline for custom focus commands (milliseconds)
    pub command_timeout_ms: u64,
    /// Focus mapping location, defaults to `focus-mapping.json` next to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_path: Option<PathBuf>,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            settle_ms: 50,
            search_timeout_ms: 2000,
            title_timeout_ms: 1000,
            command_timeout_ms: 10_000,
            mapping_path: None,
        }
    }
}

impl FocusConfig {
    pub fn options(&self) -> FocusOptions {
        FocusOptions {
            settle: Duration::from_millis(self.settle_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
        }
    }
}

/// Notification card configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardsConfig {
    /// Seconds before a card closes by itself
    pub auto_dismiss_secs: u64,
    /// Seconds a focus status line stays visible
    pub status_secs: u64,
    /// Oldest cards are dropped beyond this count
    pub max_cards: usize,
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self {
            auto_dismiss_secs: 30,
            status_secs: 4,
            max_cards: 50,
        }
    }
}
