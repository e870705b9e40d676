//! On-disk locations used by mcmu
//!
//! Everything lives under `<config dir>/mcmu`:
//! - `settings.json` for saved preferences
//! - `.env` holding the CurseForge API key
//! - `log.txt`, rewritten each run

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "mcmu";
pub const SETTINGS_FILE: &str = "settings.json";
pub const ENV_FILE: &str = ".env";
pub const LOG_FILE: &str = "log.txt";

/// Get the config directory path (~/.config/mcmu on Linux)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join(APP_DIR_NAME);

    Ok(config_dir)
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

pub fn env_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(ENV_FILE))
}

/// Create `dir` and its parents if missing
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))
}

/// Where the game looks for mods on this platform
///
/// Windows: `%APPDATA%\.minecraft\mods`
/// macOS: `~/Library/Application Support/minecraft/mods`
/// Linux: `~/.minecraft/mods`
pub fn default_mods_folder() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        dirs::config_dir().map(|d| d.join(".minecraft"))
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().map(|d| d.join("Library/Application Support/minecraft"))
    } else {
        dirs::home_dir().map(|d| d.join(".minecraft"))
    };

    base.unwrap_or_else(|| PathBuf::from(".minecraft")).join("mods")
}
