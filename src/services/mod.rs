//! Service layer for reelfetch.
//!
//! This module contains the discovery, resolution and download logic,
//! separated from UI concerns. Browser and network access go through the
//! collaborator traits in [`crate::scrapers`].

pub mod date_detection;
pub mod download;
pub mod naming;
pub mod resolve;
pub mod scan;
pub mod ytdlp;

pub use download::{
    BatchReport, DownloadConfig, DownloadEvent, DownloadService, DownloadStrategy,
    EntryProcessor, ItemPipeline,
};
pub use resolve::MediaResolver;
pub use scan::{ScanEvent, Scanner, StopReason};
pub use ytdlp::{MediaExtractor, YtDlp};
