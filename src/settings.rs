//! Saved user preferences
//!
//! Stored as pretty JSON in `<config dir>/mcmu/settings.json`. Missing keys
//! fall back to their defaults, so older files keep loading.

use crate::catalogs::Loader;
use crate::paths;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn default_backup_mods() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Folder the game loads mods from
    #[serde(default = "paths::default_mods_folder")]
    pub mods_folder: PathBuf,

    /// Target Minecraft version, e.g. `1.20.1`
    #[serde(default)]
    pub mc_version: String,

    #[serde(default)]
    pub modloader: Loader,

    /// Move existing jars into a timestamped folder before downloading
    #[serde(default = "default_backup_mods")]
    pub backup_mods: bool,

    /// Stop showing the missing CurseForge key hint
    #[serde(default)]
    pub api_warning_ignore: bool,

    /// Last used mod list
    #[serde(default)]
    pub mod_urls: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mods_folder: paths::default_mods_folder(),
            mc_version: String::new(),
            modloader: Loader::default(),
            backup_mods: default_backup_mods(),
            api_warning_ignore: false,
            mod_urls: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not load settings: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn try_load() -> Result<Self> {
        Self::load_from(&paths::settings_path()?)
    }

    /// Read settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Whether a version has been chosen yet
    pub fn has_version(&self) -> bool {
        !self.mc_version.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("settings.json")).unwrap();

        assert_eq!(settings, Settings::default());
        assert!(settings.backup_mods);
        assert_eq!(settings.modloader, Loader::Fabric);
        assert!(!settings.has_version());
    }

    #[test]
    fn test_round_trip_uses_documented_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/settings.json");

        let settings = Settings {
            mods_folder: PathBuf::from("/games/mc/mods"),
            mc_version: "1.20.1".into(),
            modloader: Loader::Quilt,
            backup_mods: false,
            api_warning_ignore: true,
            mod_urls: vec!["https://modrinth.com/mod/sodium".into()],
        };
        settings.save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in [
            "mods_folder",
            "mc_version",
            "modloader",
            "backup_mods",
            "api_warning_ignore",
            "mod_urls",
        ] {
            assert!(raw.get(key).is_some(), "missing key {}", key);
        }

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, r#"{ "mc_version": "1.19.2" }"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.mc_version, "1.19.2");
        assert!(settings.backup_mods);
        assert_eq!(settings.mods_folder, paths::default_mods_folder());
        assert!(settings.mod_urls.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }
}
