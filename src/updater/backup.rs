//! Moves the previous set of mods out of the way before an update

use crate::paths;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const JAR_EXTENSION: &str = "jar";

/// `Backup 2024-05-01 13.37.00`
pub fn backup_folder_name(at: DateTime<Local>) -> String {
    format!("Backup {}", at.format("%Y-%m-%d %H.%M.%S"))
}

fn is_jar(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(JAR_EXTENSION))
}

/// Top-level `*.jar` files in `folder`, sorted
pub fn list_jars(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut jars = Vec::new();
    for entry in fs::read_dir(folder).with_context(|| format!("Failed to read {:?}", folder))? {
        let path = entry?.path();
        if is_jar(&path) {
            jars.push(path);
        }
    }
    jars.sort();
    Ok(jars)
}

/// Move every top-level jar in `folder` into a new timestamped subfolder.
///
/// Creates `folder` if it is missing. Returns the backup folder, or `None`
/// when there was nothing to move (no folder is created in that case).
pub fn backup_existing_mods(folder: &Path) -> Result<Option<PathBuf>> {
    backup_existing_mods_at(folder, Local::now())
}

pub fn backup_existing_mods_at(folder: &Path, at: DateTime<Local>) -> Result<Option<PathBuf>> {
    if !folder.exists() {
        warn!("Mods folder {:?} not found, creating it", folder);
        paths::ensure_dir(folder)?;
    }

    let jars = list_jars(folder)?;
    if jars.is_empty() {
        info!("No mods to back up in {:?}", folder);
        return Ok(None);
    }

    let backup_dir = folder.join(backup_folder_name(at));
    fs::create_dir(&backup_dir).with_context(|| format!("Failed to create {:?}", backup_dir))?;
    info!("Moving old mods to backup folder {:?}", backup_dir);

    for jar in &jars {
        let Some(name) = jar.file_name() else {
            continue;
        };
        let target = backup_dir.join(name);
        info!("Moving '{}' to backup", name.to_string_lossy());
        fs::rename(jar, &target)
            .with_context(|| format!("Failed to move {:?} to {:?}", jar, target))?;
    }

    info!("Moved {} mods to backup", jars.len());
    Ok(Some(backup_dir))
}
