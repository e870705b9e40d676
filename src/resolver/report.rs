//! Turns a batch of outcomes into the download list and the failure report

use super::outcome::{LookupFailure, ResolutionOutcome};
use crate::catalogs::Host;

/// A resolved mod ready to be downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub name: String,
    pub file_url: String,
    pub file_name: String,
    pub source: Host,
    pub icon_url: Option<String>,
}

/// A reference that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMod {
    /// Catalog URL rebuilt from the slug, or the original URL when unsupported
    pub url: String,
    pub slug: String,
    pub host: Host,
    pub reason: String,
    pub cause: Option<LookupFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Sorted by display name, case-insensitively
    pub downloads: Vec<DownloadItem>,
    /// Sorted by slug
    pub failed: Vec<FailedMod>,
}

impl Report {
    pub fn from_outcomes(outcomes: &[ResolutionOutcome]) -> Self {
        let mut downloads = Vec::new();
        let mut failed = Vec::new();

        for outcome in outcomes {
            match outcome {
                ResolutionOutcome::Success { resolved, file, .. } => downloads.push(DownloadItem {
                    name: resolved.display_name.clone(),
                    file_url: file.download_url.clone(),
                    file_name: file.file_name.clone(),
                    source: file.source,
                    icon_url: resolved.icon_url.clone(),
                }),
                other => {
                    let reference = other.reference();
                    failed.push(FailedMod {
                        url: reference.catalog_url(),
                        slug: reference.slug.clone(),
                        host: reference.host,
                        reason: other.failure_reason().unwrap_or_default(),
                        cause: other.cause().cloned(),
                    });
                }
            }
        }

        downloads.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.file_url.cmp(&b.file_url))
        });
        failed.sort_by(|a, b| a.slug.cmp(&b.slug).then_with(|| a.url.cmp(&b.url)));

        Self { downloads, failed }
    }

    /// Whether any failure is down to the missing CurseForge key
    pub fn missing_api_key(&self) -> bool {
        self.failed
            .iter()
            .any(|f| f.cause == Some(LookupFailure::MissingApiKey))
    }

    pub fn failed_urls(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.url.as_str()).collect()
    }
}
