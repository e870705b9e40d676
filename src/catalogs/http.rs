//! Shared HTTP client setup and file downloads

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use reqwest::header::HeaderMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const USER_AGENT: &str = concat!("mcmu/", env!("CARGO_PKG_VERSION"));

/// Build a client whose connect and overall request time are bounded by `timeout`
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    build_client_with_headers(timeout, HeaderMap::new())
}

/// Same as [`build_client`], sending `headers` on every request
pub fn build_client_with_headers(timeout: Duration, headers: HeaderMap) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Sibling `.{name}.part` file a download is streamed into
pub fn partial_path(output_path: &Path) -> PathBuf {
    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_path.with_file_name(format!(".{}.part", name))
}

/// Stream `url` into `output_path`, replacing any existing file.
///
/// The body goes to a `.part` file first and is only renamed over
/// `output_path` once complete, so a failed download leaves an existing
/// file untouched.
pub async fn download_file(client: &reqwest::Client, url: &str, output_path: &Path) -> Result<u64> {
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Connection failed: {}", truncate_url(url)))?;

    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {} for {}", status.as_u16(), truncate_url(url));
    }

    let part_path = partial_path(output_path);
    let written = match write_body(response, &part_path).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&part_path, output_path).await {
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(e).with_context(|| format!("Failed to move download to {}", output_path.display()));
    }

    debug!("Wrote {} bytes to {}", written, output_path.display());
    Ok(written)
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read chunk")?;
        file.write_all(&chunk)
            .await
            .context("Failed to write chunk")?;
        written += chunk.len() as u64;
    }
    file.flush().await.context("Failed to flush file")?;

    Ok(written)
}

/// Truncate URL for error messages
fn truncate_url(url: &str) -> String {
    if url.chars().count() > 80 {
        let head: String = url.chars().take(77).collect();
        format!("{}...", head)
    } else {
        url.to_string()
    }
}
