//! CurseForge API key storage
//!
//! The key lives in `<config dir>/mcmu/.env` as a single
//! `CURSEFORGE_API_KEY=...` line. It is parsed with `dotenv` without
//! touching the process environment.

use crate::paths;

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::debug;

pub const API_KEY_VAR: &str = "CURSEFORGE_API_KEY";

/// Shown when CurseForge mods are requested without a key
pub const ONBOARDING_MESSAGE: &str = "\
CurseForge needs a personal API key to look up mods.
  1. Sign in at https://console.curseforge.com/ and open \"API keys\"
  2. Copy your key and run: mcmu api-key set <KEY>
Modrinth mods work without a key. To hide this message run: mcmu api-key ignore";

/// Read the key from an env file. Missing files and blank values give `None`.
pub fn read_api_key(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    // `from_path` would export every entry into the process environment
    #[allow(deprecated)]
    let entries = dotenv::from_path_iter(path).with_context(|| format!("Failed to open {:?}", path))?;
    for entry in entries {
        let (key, value) = entry.with_context(|| format!("Failed to parse {:?}", path))?;
        if key == API_KEY_VAR {
            return Ok(non_blank(value));
        }
    }

    debug!("{} not present in {:?}", API_KEY_VAR, path);
    Ok(None)
}

/// Write `key` to the env file, replacing its contents
pub fn write_api_key(path: &Path, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("API key is empty");
    }
    // Single quotes keep `$` literal, and CurseForge keys are full of them
    if key.contains(['\'', '\n', '\r']) {
        bail!("API key contains characters that cannot be stored");
    }

    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }
    std::fs::write(path, format!("{}='{}'\n", API_KEY_VAR, key))
        .with_context(|| format!("Failed to write {:?}", path))?;

    Ok(())
}

/// Key from the default env file
pub fn load_api_key() -> Result<Option<String>> {
    read_api_key(&paths::env_file_path()?)
}

pub fn save_api_key(key: &str) -> Result<()> {
    write_api_key(&paths::env_file_path()?, key)
}

/// `None` for blank strings, trimmed otherwise
pub fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
