//! Download phase
//!
//! Runs after resolution: optionally moves the old jars into a backup
//! folder, then downloads every resolved file one after another. A failed
//! file is logged and counted; the rest still download.

mod backup;

pub use backup::{backup_existing_mods, backup_existing_mods_at, backup_folder_name, list_jars};

use crate::catalogs::download_file;
use crate::resolver::DownloadItem;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | {msg}";

/// Download statistics
#[derive(Debug, Default)]
pub struct DownloadStats {
    pub downloaded: usize,
    pub failed: usize,
    /// Where the old jars went, if a backup was made
    pub backup_dir: Option<PathBuf>,
    /// Display names of the mods that failed
    pub failed_names: Vec<String>,
}

/// Determinate bar in the house style, ticking while work is in flight
pub fn progress_bar(len: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else {
        let kept: String = name.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// File name safe to join onto the mods folder
fn target_file_name(item: &DownloadItem) -> String {
    let candidate = Path::new(&item.file_name)
        .file_name()
        .map(|n| n.to_string_lossy().trim().to_string())
        .unwrap_or_default();

    if candidate.is_empty() || candidate == ".." {
        let stem: String = item
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}.jar", stem)
    } else {
        candidate
    }
}

/// Back up (when asked) and download `items` into `folder`.
///
/// Only the backup step can fail the whole call; download failures end up
/// in the returned stats.
pub async fn download_mods(
    client: &reqwest::Client,
    items: &[DownloadItem],
    folder: &Path,
    backup: bool,
    progress: Option<&ProgressBar>,
) -> Result<DownloadStats> {
    let mut stats = DownloadStats::default();

    if backup {
        info!("Making backup");
        stats.backup_dir = backup_existing_mods(folder)?;
    } else {
        info!("Not making backup");
    }

    for item in items {
        let file_name = target_file_name(item);
        let output_path = folder.join(&file_name);
        if let Some(pb) = progress {
            pb.set_message(format!("Downloading: {}", truncate_name(&item.name, 30)));
        }

        info!("Downloading '{}' from {}", file_name, item.source);
        match download_file(client, &item.file_url, &output_path).await {
            Ok(bytes) => {
                info!("Downloaded '{}' ({} bytes)", file_name, bytes);
                stats.downloaded += 1;
            }
            Err(e) => {
                error!("Failed to download '{}': {:#}", item.name, e);
                stats.failed += 1;
                stats.failed_names.push(item.name.clone());
            }
        }

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    info!(
        "Download finished: {} downloaded, {} failed",
        stats.downloaded, stats.failed
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogs::{build_client, Host};
    use std::fs;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(server: &MockServer, name: &str, file: &str) -> DownloadItem {
        DownloadItem {
            name: name.into(),
            file_url: format!("{}/files/{}", server.uri(), file),
            file_name: file.into(),
            source: Host::Modrinth,
            icon_url: None,
        }
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short", 30), "short");
        assert_eq!(truncate_name("abcdefghij", 8), "abcde...");
        assert_eq!(truncate_name("ééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_target_file_name_strips_directories() {
        let mut it = DownloadItem {
            name: "Bad Mod".into(),
            file_url: "https://cdn/x".into(),
            file_name: "../../evil.jar".into(),
            source: Host::CurseForge,
            icon_url: None,
        };
        assert_eq!(target_file_name(&it), "evil.jar");

        it.file_name = String::new();
        assert_eq!(target_file_name(&it), "Bad_Mod.jar");
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/a.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AAAA".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/b.jar"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/c.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CC".to_vec()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("mods");
        let client = build_client(Duration::from_secs(5)).unwrap();
        let items = vec![
            item(&server, "A", "a.jar"),
            item(&server, "B", "b.jar"),
            item(&server, "C", "c.jar"),
        ];
        let pb = ProgressBar::hidden();
        pb.set_length(items.len() as u64);

        let stats = download_mods(&client, &items, &folder, false, Some(&pb))
            .await
            .unwrap();

        assert_eq!(stats.downloaded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.failed_names, vec!["B".to_string()]);
        assert!(stats.backup_dir.is_none());
        assert_eq!(pb.position(), 3);
        assert_eq!(fs::read(folder.join("a.jar")).unwrap(), b"AAAA");
        assert_eq!(fs::read(folder.join("c.jar")).unwrap(), b"CC");
        assert!(!folder.join("b.jar").exists());
    }

    #[tokio::test]
    async fn test_failed_download_keeps_existing_jar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/sodium.jar"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let folder = temp.path();
        fs::write(folder.join("sodium.jar"), b"installed").unwrap();

        let client = build_client(Duration::from_secs(5)).unwrap();
        let items = vec![item(&server, "Sodium", "sodium.jar")];
        let stats = download_mods(&client, &items, folder, false, None).await.unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(fs::read(folder.join("sodium.jar")).unwrap(), b"installed");
        assert_eq!(list_jars(folder).unwrap(), vec![folder.join("sodium.jar")]);
        assert_eq!(fs::read_dir(folder).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_backup_runs_before_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/sodium-new.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let folder = temp.path();
        fs::write(folder.join("sodium-old.jar"), b"old").unwrap();

        let client = build_client(Duration::from_secs(5)).unwrap();
        let items = vec![item(&server, "Sodium", "sodium-new.jar")];
        let stats = download_mods(&client, &items, folder, true, None).await.unwrap();

        let backup = stats.backup_dir.unwrap();
        assert!(backup.join("sodium-old.jar").exists());
        assert!(!backup.join("sodium-new.jar").exists());
        assert_eq!(list_jars(folder).unwrap(), vec![folder.join("sodium-new.jar")]);
        assert_eq!(stats.downloaded, 1);
    }
}
