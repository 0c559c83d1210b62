//! Per-item resolution and download records.

use serde::{Deserialize, Serialize};

/// Author placeholder when no credit could be found on the page.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// A network response provisionally identified as a full video asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub url: String,
    pub size_bytes: u64,
}

/// Output of resolving one item page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// Best direct media URL, if any candidate qualified.
    pub video_url: Option<String>,
    pub author: String,
    /// Title from the page's primary heading.
    pub exact_title: Option<String>,
    /// Set when the page could not be processed at all.
    pub error: Option<String>,
}

impl ResolutionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            video_url: None,
            author: UNKNOWN_AUTHOR.to_string(),
            exact_title: None,
            error: Some(error.into()),
        }
    }
}

impl Default for ResolutionResult {
    fn default() -> Self {
        Self {
            video_url: None,
            author: UNKNOWN_AUTHOR.to_string(),
            exact_title: None,
            error: None,
        }
    }
}

/// Terminal record for one processed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
    pub final_filename: String,
}

impl DownloadOutcome {
    pub fn success(message: impl Into<String>, final_filename: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            final_filename: final_filename.into(),
        }
    }

    pub fn failure(message: impl Into<String>, final_filename: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            final_filename: final_filename.into(),
        }
    }
}
