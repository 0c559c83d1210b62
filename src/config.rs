//! Configuration management for reelfetch.
//!
//! Settings come from three layers, later layers winning:
//! defaults, a config file, then `REELFETCH_*` environment variables.
//! The file is `--config` when given, otherwise whatever `prefer` discovers
//! for "reelfetch" in the standard locations. CLI flags are applied on top by
//! the command layer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Full-resolution assets are larger than this; previews and trailers are not.
pub const DEFAULT_SIZE_FLOOR: u64 = 10 * 1024 * 1024;

/// Desktop user agent presented by browser sessions.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scan: ScanSettings,
    pub resolve: ResolveSettings,
    pub download: DownloadSettings,
    pub browser: BrowserSettings,
}

/// Listing page crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Listing page URL.
    pub base_url: String,
    /// CSS selectors of listing item containers.
    pub item_selectors: Vec<String>,
    /// Exact text of the "load more" control.
    pub load_more_label: String,
    /// Stop once the round counter exceeds this.
    pub max_rounds: u32,
    /// Stop once more than this many entries were collected.
    pub max_entries: usize,
    /// Wait after the first navigation, in milliseconds.
    pub initial_wait_ms: u64,
    /// Wait after each "load more" click, in milliseconds.
    pub load_more_wait_ms: u64,
    /// Listing page navigation timeout in seconds.
    pub navigation_timeout: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            base_url: "https://magazine.shots.net/the-work".to_string(),
            item_selectors: vec![".listing".to_string(), ".hero-item".to_string()],
            load_more_label: "Load More Work".to_string(),
            max_rounds: 30,
            max_entries: 400,
            initial_wait_ms: 3000,
            load_more_wait_ms: 2500,
            navigation_timeout: 45,
        }
    }
}

/// Item page resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSettings {
    /// Item page navigation timeout in seconds.
    pub navigation_timeout: u64,
    /// Wait after navigation before reading the page, in milliseconds.
    pub post_load_wait_ms: u64,
    /// Candidate play controls, tried in order.
    pub play_selectors: Vec<String>,
    /// Wait after clicking play, in milliseconds.
    pub settle_ms: u64,
    /// Credit label whose neighbour holds the author.
    pub author_label: String,
    /// URL fragments that mark a video file.
    pub video_url_markers: Vec<String>,
    pub user_agent: String,
    /// Maximum responses recorded per page visit.
    pub max_observed_responses: usize,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: 45,
            post_load_wait_ms: 3000,
            play_selectors: vec![
                ".video__cover.js-play-video".to_string(),
                ".video__play".to_string(),
                ".play-button".to_string(),
            ],
            settle_ms: 8000,
            author_label: "DIRECTOR".to_string(),
            video_url_markers: vec![".mp4".to_string()],
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_observed_responses: 2048,
        }
    }
}

/// Download and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Target directory; `~` and `$VARS` are expanded.
    pub directory: String,
    /// Minimum accepted asset size in bytes.
    pub size_floor: u64,
    /// Concurrent items.
    pub workers: usize,
    /// Pause before a submission that starts a new batch of `workers`, in milliseconds.
    pub batch_pause_ms: u64,
    /// Pause before every other submission, in milliseconds.
    pub item_pause_ms: u64,
    /// Connect timeout for direct downloads in seconds.
    pub connect_timeout: u64,
    /// yt-dlp executable.
    pub ytdlp_binary: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            directory: "downloads".to_string(),
            size_floor: DEFAULT_SIZE_FLOOR,
            workers: 2,
            batch_pause_ms: 3000,
            item_pause_ms: 1000,
            connect_timeout: 30,
            ytdlp_binary: "yt-dlp".to_string(),
        }
    }
}

/// Browser process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run in headless mode (default: true).
    pub headless: bool,
    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    pub remote_url: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from a discovered config file, then
    /// apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::discover().await?,
        };
        settings.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Use prefer for file discovery, then parse with serde.
    async fn discover() -> Result<Self, ConfigError> {
        match prefer::load("reelfetch").await {
            Ok(found) => match found.source_path() {
                Some(path) => Self::from_file(path),
                None => Ok(Self::default()),
            },
            Err(_) => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a settings file, choosing the format from its extension.
    ///
    /// `.json`, `.yaml` and `.yml` are parsed as such; anything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parsed: Result<Self, Box<dyn std::error::Error + Send + Sync>> = match ext {
            "json" => serde_json::from_str(&contents).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(Into::into),
            _ => toml::from_str(&contents).map_err(Into::into),
        };
        let settings = parsed.map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    /// Apply `REELFETCH_*` overrides read through `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup("REELFETCH_DOWNLOAD_DIR") {
            self.download.directory = dir;
        }
        if let Some(url) = lookup("REELFETCH_BASE_URL") {
            self.scan.base_url = url;
        }
        if let Some(workers) = lookup("REELFETCH_WORKERS") {
            self.download.workers = match workers.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "REELFETCH_WORKERS".to_string(),
                        value: workers,
                    })
                }
            };
        }
        if let Some(url) = lookup("REELFETCH_BROWSER_URL") {
            self.browser.remote_url = Some(url);
        }
        Ok(self)
    }

    /// Download directory with `~` and environment variables expanded.
    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::full(&self.download.directory).map_or_else(
            |_| self.download.directory.clone(),
            |expanded| expanded.into_owned(),
        ))
    }

    /// Ensure the download directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.download_dir())
    }

    /// Serialize the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl ResolveSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    pub fn post_load_wait(&self) -> Duration {
        Duration::from_millis(self.post_load_wait_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl ScanSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn load_more_wait(&self) -> Duration {
        Duration::from_millis(self.load_more_wait_ms)
    }
}
