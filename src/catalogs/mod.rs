//! Catalog clients for the two supported mod hosts
//!
//! CurseForge is searched by slug and needs an API key; Modrinth is looked up
//! directly by slug. Both clients resolve in two steps: find the mod, then
//! find the file matching a game version and loader.

mod curseforge;
mod http;
mod modrinth;

pub use curseforge::{select_file, CurseForgeClient, CurseForgeFile};
pub use http::{build_client, build_client_with_headers, download_file, partial_path};
pub use modrinth::{select_version, ModrinthClient, ModrinthFile, ModrinthVersion};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Retries allowed after the first attempt times out
pub const MAX_TIMEOUT_RETRIES: u32 = 3;

/// Per-request timeout for catalog API calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mod page prefix for CurseForge URLs
pub const CURSEFORGE_MOD_URL: &str = "https://www.curseforge.com/minecraft/mc-mods";

/// Mod page prefix for Modrinth URLs
pub const MODRINTH_MOD_URL: &str = "https://modrinth.com/mod";

/// Errors raised by catalog clients.
///
/// "Not found" is never an error: lookups return `Ok(None)` for that.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("CurseForge API key is not set")]
    MissingApiKey,

    #[error("request timed out after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Which catalog a mod URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Host {
    CurseForge,
    Modrinth,
    Unsupported,
}

impl Host {
    /// Label shown next to a resolved file
    pub fn label(self) -> &'static str {
        match self {
            Host::CurseForge => "CurseForge",
            Host::Modrinth => "Modrinth",
            Host::Unsupported => "Unsupported",
        }
    }

    /// Prefix of this host's mod pages, used to rebuild URLs from slugs
    pub fn mod_page_base(self) -> Option<&'static str> {
        match self {
            Host::CurseForge => Some(CURSEFORGE_MOD_URL),
            Host::Modrinth => Some(MODRINTH_MOD_URL),
            Host::Unsupported => None,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mod loader a file must be built for
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum Loader {
    #[serde(alias = "any")]
    Any,
    #[serde(alias = "forge")]
    Forge,
    #[serde(alias = "cauldron")]
    Cauldron,
    #[serde(alias = "liteloader")]
    #[value(name = "liteloader")]
    LiteLoader,
    #[default]
    #[serde(alias = "fabric")]
    Fabric,
    #[serde(alias = "quilt")]
    Quilt,
}

impl Loader {
    /// Numeric `modLoaderType` used by the CurseForge API
    pub fn curseforge_type(self) -> u32 {
        match self {
            Loader::Any => 0,
            Loader::Forge => 1,
            Loader::Cauldron => 2,
            Loader::LiteLoader => 3,
            Loader::Fabric => 4,
            Loader::Quilt => 5,
        }
    }

    /// Loader name as listed in Modrinth versions; `None` matches any loader
    pub fn modrinth_name(self) -> Option<&'static str> {
        match self {
            Loader::Any => None,
            Loader::Forge => Some("forge"),
            Loader::Cauldron => Some("cauldron"),
            Loader::LiteLoader => Some("liteloader"),
            Loader::Fabric => Some("fabric"),
            Loader::Quilt => Some("quilt"),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Loader::Any => "Any",
            Loader::Forge => "Forge",
            Loader::Cauldron => "Cauldron",
            Loader::LiteLoader => "LiteLoader",
            Loader::Fabric => "Fabric",
            Loader::Quilt => "Quilt",
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A mod record found in a catalog
#[derive(Debug, Clone)]
pub struct ResolvedMod {
    /// Identifier used for the file lookup (numeric id on CurseForge, slug on Modrinth)
    pub mod_id: String,
    pub display_name: String,
    pub icon_url: Option<String>,
    /// Catalog payload as returned by the API
    pub raw: serde_json::Value,
}

/// A downloadable file chosen for a mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub download_url: String,
    pub file_name: String,
    pub source: Host,
}

impl SelectedFile {
    pub fn new(download_url: impl Into<String>, source: Host) -> Self {
        let download_url = download_url.into();
        let file_name = file_name_from_url(&download_url);
        Self {
            download_url,
            file_name,
            source,
        }
    }
}

/// Last path segment of a URL, percent-decoded
pub fn file_name_from_url(url: &str) -> String {
    let segment = url.trim().rsplit('/').next().unwrap_or_default();
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// Endpoint and timeout for one catalog client
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// API root including the version prefix, without trailing slash
    pub api_url: String,
    pub timeout: Duration,
}

impl CatalogConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Run a request, retrying only when it times out.
///
/// The request is attempted at most `MAX_TIMEOUT_RETRIES + 1` times. Any other
/// transport error is returned right away.
pub(crate) async fn with_timeout_retry<F, Fut, T>(operation: &str, mut f: F) -> CatalogResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(result);
            }
            Err(e) if e.is_timeout() => {
                if attempt > MAX_TIMEOUT_RETRIES {
                    error!("{}: max attempts made ({}), giving up", operation, attempt);
                    return Err(CatalogError::TimedOut { attempts: attempt });
                }
                warn!(
                    "{} timed out, trying again ({}/{})",
                    operation, attempt, MAX_TIMEOUT_RETRIES
                );
            }
            Err(e) => return Err(CatalogError::Transport(e)),
        }
    }
}
