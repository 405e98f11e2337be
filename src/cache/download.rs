//! HTTP download into a cache path.
//!
//! The body is streamed chunk by chunk into a `.part` sibling and renamed into
//! place only after the last chunk is flushed, so the destination is either
//! absent or complete.

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::core::StackError;
use crate::utils::fs::{ensure_dir, partial_path};

/// Build the HTTP client used for every fetch of a run.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("stackctl/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Stream `url` to `dest`.
///
/// Non-2xx statuses and transport failures are [`StackError::FetchError`].
pub async fn download(client: &Client, url: &Url, dest: &Path) -> Result<()> {
    tracing::debug!("Downloading {} -> {}", url, dest.display());

    let fetch_error = |reason: String| StackError::FetchError {
        url: url.to_string(),
        reason,
    };

    let mut response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP status {status}")).into());
    }

    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = partial_path(dest);
    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .with_context(|| format!("Failed to create {}", temp_path.display()))?;

    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.map_err(|e| fetch_error(e.to_string()))? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&temp_path, dest)
        .await
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;

    tracing::trace!("Downloaded {} bytes from {}", written, url);
    Ok(())
}

/// Fetch `url` into memory, bypassing the cache.
pub async fn fetch_text(client: &Client, url: &Url) -> Result<String> {
    let fetch_error = |reason: String| StackError::FetchError {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP status {status}")).into());
    }
    Ok(response.text().await.map_err(|e| fetch_error(e.to_string()))?)
}

/// Copy a `file://` resource into `dest`, used when a side-resource is local.
pub async fn copy_local(url: &Url, dest: &Path) -> Result<()> {
    let source = url.to_file_path().map_err(|()| StackError::InvalidReference {
        reference: url.to_string(),
        reason: "not a local file path".to_string(),
    })?;
    let bytes = tokio::fs::read(&source).await.map_err(|e| StackError::FetchError {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    crate::utils::fs::atomic_write(dest, &bytes)
}
