//! Persistent command line settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use bbio_detect::DetectConfig;
use serde::{Deserialize, Serialize};

/// Settings remembered between runs
///
/// A detected rate is never stored: every run scans from scratch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Serial port of the adapter
    #[serde(default)]
    pub port: Option<String>,
    /// How long to wait for a target byte before giving up on a rate
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Wake silent targets with a line ending
    #[serde(default)]
    pub trigger: bool,
}

fn default_read_timeout_ms() -> u64 {
    2000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            read_timeout_ms: default_read_timeout_ms(),
            trigger: false,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for baudscan
    /// Uses $XDG_CONFIG_HOME/baudscan, falls back to ~/.config/baudscan
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("baudscan"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("baudscan"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    /// Detection parameters for these settings
    pub fn detect_config(&self) -> DetectConfig {
        DetectConfig {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            trigger: self.trigger,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("baudscan-test-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_round_trip() {
        let path = scratch_file("round-trip");
        let settings = Settings {
            port: Some("/dev/ttyACM0".to_string()),
            read_timeout_ms: 750,
            trigger: true,
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_or_broken_file_gives_defaults() {
        let path = scratch_file("missing");
        assert_eq!(Settings::load_from(&path), Settings::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"port": "COM3"}"#).unwrap();
        assert_eq!(settings.port.as_deref(), Some("COM3"));
        assert_eq!(settings.read_timeout_ms, 2000);
        assert!(!settings.trigger);
    }

    #[test]
    fn test_detect_config() {
        let settings = Settings {
            read_timeout_ms: 500,
            trigger: true,
            ..Default::default()
        };
        let config = settings.detect_config();
        assert_eq!(config.read_timeout, Duration::from_millis(500));
        assert!(config.trigger);
        assert_eq!(config.candidates.len(), 5);
    }
}
