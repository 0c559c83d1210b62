//! Per-entry processing: resolve the page, name the file, retrieve it.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::strategy::DownloadStrategy;
use crate::error::SessionError;
use crate::models::{DownloadOutcome, ListingEntry};
use crate::services::naming::{build_filename, final_title, DEFAULT_EXTENSION};
use crate::services::resolve::MediaResolver;

/// Turns one listing entry into its terminal outcome.
///
/// `Err(SessionError::Unavailable)` halts the batch; any other `Err` fails
/// only this entry.
#[async_trait]
pub trait EntryProcessor: Send + Sync {
    async fn process(&self, entry: &ListingEntry) -> Result<DownloadOutcome, SessionError>;
}

/// Resolver followed by the tiered download.
pub struct ItemPipeline {
    resolver: MediaResolver,
    strategy: DownloadStrategy,
    directory: PathBuf,
    dry_run: bool,
}

impl ItemPipeline {
    pub fn new(resolver: MediaResolver, strategy: DownloadStrategy, directory: PathBuf) -> Self {
        Self {
            resolver,
            strategy,
            directory,
            dry_run: false,
        }
    }

    /// Resolve and name entries without retrieving anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[async_trait]
impl EntryProcessor for ItemPipeline {
    async fn process(&self, entry: &ListingEntry) -> Result<DownloadOutcome, SessionError> {
        let resolution = self.resolver.resolve(&entry.link).await?;
        if let Some(error) = resolution.error {
            return Ok(DownloadOutcome::failure(
                format!("analysis failed: {}", error),
                entry.title.clone(),
            ));
        }

        let title = final_title(resolution.exact_title.as_deref(), &entry.title);
        let filename = build_filename(
            title,
            &resolution.author,
            entry.published_date,
            DEFAULT_EXTENSION,
        );
        let target = self.directory.join(&filename);
        debug!("{} -> {}", entry.link, target.display());

        if self.dry_run {
            let source = resolution
                .video_url
                .as_deref()
                .unwrap_or("generic extractor");
            return Ok(DownloadOutcome::success(
                format!("dry run: would fetch {}", source),
                filename,
            ));
        }

        Ok(self
            .strategy
            .download(resolution.video_url.as_deref(), &entry.link, &target)
            .await)
    }
}
