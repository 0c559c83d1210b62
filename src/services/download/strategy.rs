//! Tiered retrieval of one media asset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::types::megabytes;
use crate::models::DownloadOutcome;
use crate::scrapers::{ByteStream, MediaFetcher};
use crate::services::ytdlp::MediaExtractor;

/// Result of a direct fetch that did not fail.
enum Direct {
    Written(u64),
    TooSmall(u64),
}

/// Fetches an asset directly when its URL is known, falling back to the
/// generic extractor, and rejects anything under the size floor.
pub struct DownloadStrategy {
    fetcher: Arc<dyn MediaFetcher>,
    extractor: Arc<dyn MediaExtractor>,
    size_floor: u64,
}

impl DownloadStrategy {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        extractor: Arc<dyn MediaExtractor>,
        size_floor: u64,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            size_floor,
        }
    }

    /// Retrieve the asset for `page_url` into `target`.
    ///
    /// An existing `target` short-circuits both tiers.
    pub async fn download(
        &self,
        video_url: Option<&str>,
        page_url: &str,
        target: &Path,
    ) -> DownloadOutcome {
        let filename = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if tokio::fs::try_exists(target).await.unwrap_or(false) {
            info!("Already downloaded: {}", target.display());
            return DownloadOutcome::success(format!("already exists: {}", filename), filename);
        }

        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return DownloadOutcome::failure(
                    format!("cannot create {}: {}", parent.display(), e),
                    filename,
                );
            }
        }

        let mut direct_note = None;
        if let Some(url) = video_url {
            match self.download_direct(url, target).await {
                Ok(Direct::Written(bytes)) => {
                    info!("Downloaded {} ({})", filename, megabytes(bytes));
                    return DownloadOutcome::success(
                        format!("downloaded: {} ({})", filename, megabytes(bytes)),
                        filename,
                    );
                }
                Ok(Direct::TooSmall(bytes)) => {
                    let note = format!("skipped: file too small ({})", megabytes(bytes));
                    info!("{}: {}", url, note);
                    direct_note = Some(note);
                }
                Err(e) => {
                    warn!("Direct download of {} failed: {}", url, e);
                    direct_note = Some(format!("direct download failed: {}", e));
                }
            }
        }

        match self.download_extracted(page_url, target).await {
            Ok(bytes) => {
                info!("Extracted {} ({})", filename, megabytes(bytes));
                DownloadOutcome::success(
                    format!("downloaded via extractor: {} ({})", filename, megabytes(bytes)),
                    filename,
                )
            }
            Err(reason) => {
                let message = match direct_note {
                    Some(note) => format!("{}; {}", note, reason),
                    None => reason,
                };
                DownloadOutcome::failure(message, filename)
            }
        }
    }

    async fn download_direct(&self, url: &str, target: &Path) -> anyhow::Result<Direct> {
        let response = self.fetcher.get_stream(url).await?;
        if !response.is_success() {
            anyhow::bail!("HTTP {}", response.status);
        }

        if let Some(declared) = response.content_length() {
            if declared < self.size_floor {
                return Ok(Direct::TooSmall(declared));
            }
        }

        let part = part_path(target);
        match write_stream(response.body, &part).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, target).await?;
                Ok(Direct::Written(bytes))
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    /// Run the extractor and validate what it left on disk.
    async fn download_extracted(&self, page_url: &str, target: &Path) -> Result<u64, String> {
        if let Err(e) = self
            .extractor
            .download(page_url, target, self.size_floor)
            .await
        {
            return Err(format!("failed: {}", e));
        }

        let size = match tokio::fs::metadata(target).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err("failed: extractor produced no file".to_string()),
        };

        if size < self.size_floor {
            debug!("Removing preview-size file {}", target.display());
            if let Err(e) = tokio::fs::remove_file(target).await {
                warn!("Failed to remove {}: {}", target.display(), e);
            }
            return Err(format!(
                "failed: only a preview-size file was obtainable ({})",
                megabytes(size)
            ));
        }

        Ok(size)
    }
}

/// Sibling path used while a stream is in flight.
fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn write_stream(mut body: ByteStream, path: &Path) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
