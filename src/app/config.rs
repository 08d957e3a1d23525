//! Host-side configuration
//!
//! Describes the hardware the terminal core runs against when it is hosted
//! on a workstation (headless runner, tests): display mode, font cell, scroll
//! settling delay and where the settings store lives. Device settings that
//! the user edits on the terminal itself are in [`super::settings`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{Resolution, BASE_FONT};
use crate::engine::SETTLE_DELAY;
use crate::error::Result;
use crate::input::EVENT_QUEUE_CAPACITY;

/// Host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Display settings
    pub display: DisplayConfig,
    /// File backing the settings store (in-memory store if unset)
    pub settings_path: Option<PathBuf>,
    /// Input event queue slots
    pub event_queue_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            settings_path: None,
            event_queue_capacity: EVENT_QUEUE_CAPACITY,
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Native resolution
    pub resolution: Resolution,
    /// Font cell width at scale 0
    pub font_width: u16,
    /// Font cell height at scale 0
    pub font_height: u16,
    /// Delay between a scroll transfer and the row fill, in milliseconds
    pub settle_delay_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            font_width: BASE_FONT.0,
            font_height: BASE_FONT.1,
            settle_delay_ms: SETTLE_DELAY.as_millis() as u64,
        }
    }
}

impl DisplayConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl HostConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from default location or return default config
    pub fn load_or_default() -> Self {
        // Try to load from ~/.config/rasterterm/config.json
        if let Some(config_dir) = dirs_config_path() {
            let config_path = config_dir.join("config.json");
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(e) => warn!("Ignoring {}: {}", config_path.display(), e),
                }
            }
        }
        debug!("Using default host config");
        Self::default()
    }
}

/// Get the configuration directory path
fn dirs_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("rasterterm"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HostConfig::default();
        assert_eq!(config.display.resolution, Resolution::R800x480);
        assert_eq!((config.display.font_width, config.display.font_height), (8, 16));
        assert_eq!(config.display.settle_delay(), Duration::from_millis(50));
        assert_eq!(config.event_queue_capacity, 16);
        assert!(config.settings_path.is_none());
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = HostConfig {
            display: DisplayConfig {
                resolution: Resolution::R480x272,
                settle_delay_ms: 0,
                ..Default::default()
            },
            settings_path: Some(dir.path().join("settings.bin")),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(HostConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_config_partial_json() {
        let config: HostConfig =
            serde_json::from_str(r#"{ "display": { "resolution": "R320x240" } }"#).unwrap();
        assert_eq!(config.display.resolution, Resolution::R320x240);
        assert_eq!(config.display.font_width, 8);
        assert_eq!(config.event_queue_capacity, 16);
    }

    #[test]
    fn test_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HostConfig::load(&dir.path().join("nope.json")).is_err());
    }
}
