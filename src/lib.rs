//! mcmu - Minecraft mod updater
//!
//! Resolves CurseForge and Modrinth mod page URLs to the file matching one
//! game version and mod loader, then downloads them into the mods folder.

pub mod catalogs;
pub mod credentials;
pub mod logging;
pub mod paths;
pub mod resolver;
pub mod settings;
pub mod updater;
