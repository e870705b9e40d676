//! CurseForge API client
//!
//! Mods are found through the search endpoint filtered by slug, then the
//! mod's file list is filtered by game version and loader type.

use super::{
    build_client_with_headers, with_timeout_retry, CatalogConfig, CatalogError, CatalogResult, Host, Loader, ResolvedMod,
    SelectedFile,
};

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

pub const API_URL: &str = "https://api.curseforge.com/v1";
const AUTH_HEADER: &str = "x-api-key";

/// Game id for Minecraft
const GAME_ID: u32 = 432;
/// Class id for mods (as opposed to modpacks, resource packs, ...)
const CLASS_ID: u32 = 6;
const PAGE_SIZE: u32 = 200;

/// `{ "data": ... }` envelope wrapping every CurseForge response
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseForgeMod {
    id: u64,
    name: String,
    #[serde(default)]
    logo: Option<CurseForgeLogo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseForgeLogo {
    #[serde(default)]
    thumbnail_url: Option<String>,
}

/// One entry of a mod's file list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeFile {
    pub id: u64,
    #[serde(default)]
    pub file_name: String,
    /// Null when the author disabled third-party downloads
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
}

/// CurseForge API client
pub struct CurseForgeClient {
    client: Client,
    api_url: String,
    has_api_key: bool,
    /// Requests sent this session, retries included
    request_count: AtomicUsize,
}

impl CurseForgeClient {
    /// Create a client against the public API.
    ///
    /// Without a key the client is still usable but refuses every lookup.
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        Self::with_config(api_key, CatalogConfig::new(API_URL))
    }

    pub fn with_config(api_key: Option<&str>, config: CatalogConfig) -> Result<Self> {
        let api_key = api_key.map(str::trim).filter(|key| !key.is_empty());

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(
                AUTH_HEADER,
                HeaderValue::from_str(key).context("Invalid API key format")?,
            );
        }

        let client = build_client_with_headers(config.timeout, headers)?;

        Ok(Self {
            client,
            api_url: config.api_url,
            has_api_key: api_key.is_some(),
            request_count: AtomicUsize::new(0),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.has_api_key
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Find a mod by its slug. The first search hit is the match.
    pub async fn find_mod(&self, slug: &str) -> CatalogResult<Option<ResolvedMod>> {
        let url = format!("{}/mods/search", self.api_url);
        let query = [
            ("gameId", GAME_ID.to_string()),
            ("classId", CLASS_ID.to_string()),
            ("slug", slug.to_string()),
        ];

        let body = self.get(&url, &query, slug).await?;
        let envelope: Envelope<Vec<serde_json::Value>> = serde_json::from_str(&body)?;

        let Some(raw) = envelope.data.into_iter().next() else {
            debug!("CurseForge search returned no mod for '{}'", slug);
            return Ok(None);
        };

        let record: CurseForgeMod = serde_json::from_value(raw.clone())?;
        Ok(Some(ResolvedMod {
            mod_id: record.id.to_string(),
            display_name: record.name,
            icon_url: record.logo.and_then(|logo| logo.thumbnail_url),
            raw,
        }))
    }

    /// Find the first acceptable file of a mod for `game_version` and `loader`
    pub async fn find_file(
        &self,
        mod_id: &str,
        game_version: &str,
        loader: Loader,
    ) -> CatalogResult<Option<SelectedFile>> {
        let url = format!("{}/mods/{}/files", self.api_url, urlencoding::encode(mod_id));
        let query = [
            ("gameVersion", game_version.to_string()),
            ("modLoaderType", loader.curseforge_type().to_string()),
            ("pageSize", PAGE_SIZE.to_string()),
        ];

        let body = self.get(&url, &query, mod_id).await?;
        let envelope: Envelope<Vec<CurseForgeFile>> = serde_json::from_str(&body)?;

        let selected = select_file(&envelope.data, game_version)
            .and_then(|file| file.download_url.as_deref())
            .map(|download_url| SelectedFile::new(download_url, Host::CurseForge));

        if selected.is_none() {
            debug!(
                "No CurseForge file of mod {} matches {} ({} candidates)",
                mod_id,
                game_version,
                envelope.data.len()
            );
        }
        Ok(selected)
    }

    /// Authenticated GET returning the body of a successful response
    async fn get(&self, url: &str, query: &[(&str, String)], subject: &str) -> CatalogResult<String> {
        if !self.has_api_key {
            return Err(CatalogError::MissingApiKey);
        }

        let operation = format!("CurseForge request for '{}'", subject);
        let (status, body) = with_timeout_retry(&operation, move || async move {
            self.request_count.fetch_add(1, Ordering::Relaxed);
            let response = self.client.get(url).query(query).send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        })
        .await?;

        if status != StatusCode::OK {
            return Err(CatalogError::Status(status));
        }
        Ok(body)
    }
}

/// Pick the first file with a download URL that fits `game_version`.
///
/// The API also returns snapshot builds tagged `{major}-Snapshot` (e.g.
/// `1.20-Snapshot` for `1.20`); those are only usable when they list the
/// exact version as well, same as every other file.
pub fn select_file<'a>(files: &'a [CurseForgeFile], game_version: &str) -> Option<&'a CurseForgeFile> {
    files.iter().find(|file| {
        let has_version = file.game_versions.iter().any(|v| v == game_version);
        if !has_version && file.game_versions.contains(&snapshot_tag(game_version)) {
            debug!("Skipping snapshot build {} for {}", file.file_name, game_version);
        }
        has_version && file.download_url.is_some()
    })
}

/// Snapshot tag for the major version: `1.20.1` -> `1.20-Snapshot`
fn snapshot_tag(game_version: &str) -> String {
    let major = game_version.split('.').take(2).collect::<Vec<_>>().join(".");
    format!("{}-Snapshot", major)
}
