//! Modrinth API client
//!
//! Projects are fetched directly by slug; no API key is needed.

use super::{
    build_client, with_timeout_retry, CatalogConfig, CatalogResult, Host, Loader, ResolvedMod,
    SelectedFile,
};

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

pub const API_URL: &str = "https://api.modrinth.com/v2";

#[derive(Debug, Deserialize)]
struct Project {
    slug: String,
    title: String,
    #[serde(default)]
    icon_url: Option<String>,
}

/// One published version of a project
#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthVersion {
    pub id: String,
    #[serde(default)]
    pub version_number: String,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub files: Vec<ModrinthFile>,
}

impl ModrinthVersion {
    /// The primary file, or the first one if none is flagged
    pub fn main_file(&self) -> Option<&ModrinthFile> {
        self.files
            .iter()
            .find(|file| file.primary)
            .or_else(|| self.files.first())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthFile {
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
}

/// Modrinth API client
pub struct ModrinthClient {
    client: Client,
    api_url: String,
    request_count: AtomicUsize,
}

impl ModrinthClient {
    pub fn new() -> Result<Self> {
        Self::with_config(CatalogConfig::new(API_URL))
    }

    pub fn with_config(config: CatalogConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            api_url: config.api_url,
            request_count: AtomicUsize::new(0),
        })
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Fetch a project by slug. Non-200 responses and undecodable bodies yield `None`.
    pub async fn find_mod(&self, slug: &str) -> CatalogResult<Option<ResolvedMod>> {
        let url = format!("{}/project/{}", self.api_url, urlencoding::encode(slug));
        let (status, body) = self.get(&url, slug).await?;

        if status != StatusCode::OK {
            debug!("Modrinth returned {} for project '{}'", status, slug);
            return Ok(None);
        }

        let raw: serde_json::Value = match serde_json::from_str(&body) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Could not decode Modrinth project '{}': {}", slug, e);
                return Ok(None);
            }
        };
        let project: Project = match serde_json::from_value(raw.clone()) {
            Ok(project) => project,
            Err(e) => {
                debug!("Unexpected Modrinth project shape for '{}': {}", slug, e);
                return Ok(None);
            }
        };

        Ok(Some(ResolvedMod {
            mod_id: project.slug,
            display_name: project.title,
            icon_url: project.icon_url,
            raw,
        }))
    }

    /// Find the newest version of `mod_slug` for `game_version` and `loader`
    pub async fn find_file(
        &self,
        mod_slug: &str,
        game_version: &str,
        loader: Loader,
    ) -> CatalogResult<Option<SelectedFile>> {
        let url = format!("{}/project/{}/version", self.api_url, urlencoding::encode(mod_slug));
        let (status, body) = self.get(&url, mod_slug).await?;

        if status != StatusCode::OK {
            debug!("Modrinth returned {} for versions of '{}'", status, mod_slug);
            return Ok(None);
        }

        let versions: Vec<ModrinthVersion> = serde_json::from_str(&body)?;
        let selected = select_version(&versions, game_version, loader.modrinth_name())
            .and_then(ModrinthVersion::main_file)
            .map(|file| SelectedFile::new(file.url.as_str(), Host::Modrinth));

        Ok(selected)
    }

    async fn get(&self, url: &str, subject: &str) -> CatalogResult<(StatusCode, String)> {
        let operation = format!("Modrinth request for '{}'", subject);
        with_timeout_retry(&operation, move || async move {
            self.request_count.fetch_add(1, Ordering::Relaxed);
            let response = self.client.get(url).send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        })
        .await
    }
}

/// Pick the version to download.
///
/// Every entry listing `game_version` (and `loader`, when given) overwrites
/// the previous pick, so the last match in response order wins. Entries
/// without files are ignored.
pub fn select_version<'a>(
    versions: &'a [ModrinthVersion],
    game_version: &str,
    loader: Option<&str>,
) -> Option<&'a ModrinthVersion> {
    let mut best = None;
    for version in versions {
        let has_game_version = version.game_versions.iter().any(|v| v == game_version);
        let has_loader = loader.map_or(true, |l| version.loaders.iter().any(|v| v == l));
        if has_game_version && has_loader && !version.files.is_empty() {
            best = Some(version);
        }
    }
    best
}
