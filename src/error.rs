//! Error types for the external collaborators.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a browser session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The browser could not be launched or connected to.
    #[error("Browser unavailable: {0}")]
    Unavailable(String),
    #[error("Navigation to {url} timed out after {seconds}s")]
    NavigationTimeout { url: String, seconds: u64 },
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Page script failed: {0}")]
    Script(String),
}

/// Failures reported by the generic media extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to execute {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("yt-dlp failed: {0}")]
    Failed(String),
}

/// Failures while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}
