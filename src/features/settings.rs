//! Settings persistence
//!
//! Handles saving and loading user preferences.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::Hotkey;
use crate::lifecycle::DetectionPolicy;
use crate::page::PlaybackPagePattern;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Key combination that triggers an undo
    pub undo_hotkey: Hotkey,
    /// Which pages count as playback pages
    pub site: PlaybackPagePattern,
    /// Player detection backoff
    pub detection: DetectionPolicy,
    /// How long re-classification stays suppressed after an undo (ms)
    pub settle_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            undo_hotkey: Hotkey::default(),
            site: PlaybackPagePattern::default(),
            detection: DetectionPolicy::default(),
            settle_delay_ms: 100,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "seekback", "Seekback")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            warn!("Ignoring settings at {:?}: {}", path, e);
            Self::default()
        })
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SettingsError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(path) = Self::file_path() {
            self.save_to_file(&path)
        } else {
            Err(SettingsError::Io(
                "Could not determine config directory".to_string(),
            ))
        }
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| SettingsError::Io(e.to_string()))?;
        Ok(())
    }

    /// Replace the undo hotkey after checking it
    pub fn set_undo_hotkey(&mut self, hotkey: Hotkey) -> Result<(), SettingsError> {
        hotkey
            .validate()
            .map_err(|e| SettingsError::InvalidHotkey(e.to_string()))?;
        self.undo_hotkey = hotkey;
        Ok(())
    }

    pub fn reset_undo_hotkey(&mut self) {
        self.undo_hotkey = Hotkey::default();
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Errors that can occur with settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid hotkey: {0}")]
    InvalidHotkey(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ModifierSet;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.undo_hotkey.display(), "Ctrl+Z");
        assert_eq!(settings.site.host, "www.youtube.com");
        assert_eq!(settings.settle_delay(), Duration::from_millis(100));
        assert_eq!(settings.detection.max_attempts, 5);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings
            .set_undo_hotkey("Alt+Shift+U".parse().unwrap())
            .unwrap();
        settings.settle_delay_ms = 250;
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_captured_plus_hotkey_survives_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        let modifiers = ModifierSet {
            ctrl: true,
            shift: true,
            ..Default::default()
        };

        let mut settings = Settings::default();
        settings.settle_delay_ms = 300;
        settings
            .set_undo_hotkey(Hotkey::from_key_event(modifiers, "+").unwrap())
            .unwrap();
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded.undo_hotkey.display(), "Ctrl+Shift++");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{ "undo_hotkey": "Ctrl+Alt+Z" }"#).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded.undo_hotkey.display(), "Ctrl+Alt+Z");
        assert_eq!(loaded.site, PlaybackPagePattern::default());
        assert_eq!(loaded.settle_delay_ms, 100);
    }

    #[test]
    fn test_invalid_hotkey_in_file_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{ "undo_hotkey": "Ctrl+W" }"#).unwrap();

        assert!(matches!(
            Settings::load_from_file(&path),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_set_undo_hotkey_rejects_bare_key() {
        let mut settings = Settings::default();
        let result = settings.set_undo_hotkey(Hotkey::new("Z"));
        assert!(matches!(result, Err(SettingsError::InvalidHotkey(_))));
        assert_eq!(settings.undo_hotkey, Hotkey::default());

        settings.set_undo_hotkey(Hotkey::new("Y").ctrl()).unwrap();
        settings.reset_undo_hotkey();
        assert_eq!(settings.undo_hotkey, Hotkey::default());
    }
}
