//! Generic media extraction using yt-dlp.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ExtractError;

/// Downloads the media embedded in a page to a fixed output path.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download the best video+audio of `page_url` to `output`, preferring
    /// formats whose declared filesize exceeds `min_filesize` bytes.
    async fn download(
        &self,
        page_url: &str,
        output: &Path,
        min_filesize: u64,
    ) -> Result<(), ExtractError>;
}

/// yt-dlp format rule: best video+audio pair, else best combined format, each
/// component larger than `min_filesize` bytes.
pub fn format_selector(min_filesize: u64) -> String {
    format!(
        "bestvideo[filesize>{size}]+bestaudio/best[filesize>{size}]",
        size = min_filesize
    )
}

/// Escape a literal path for use as a yt-dlp output template.
fn output_template(output: &Path) -> String {
    output.to_string_lossy().replace('%', "%%")
}

/// yt-dlp subprocess wrapper.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    proxy: Option<String>,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            proxy: None,
        }
    }

    /// Route yt-dlp traffic through `proxy` (e.g. "socks5://127.0.0.1:9050").
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    fn command(&self, page_url: &str, output: &Path, min_filesize: u64) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--quiet",
            "--no-warnings",
            "--no-playlist",
            "--no-progress",
            "--format",
            &format_selector(min_filesize),
            "--merge-output-format",
            "mp4",
            "--output",
            &output_template(output),
        ]);

        if let Some(ref proxy) = self.proxy {
            debug!("Using proxy for yt-dlp: {}", proxy);
            cmd.args(["--proxy", proxy]);
        }

        cmd.arg(page_url);
        cmd
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn download(
        &self,
        page_url: &str,
        output: &Path,
        min_filesize: u64,
    ) -> Result<(), ExtractError> {
        info!("Extracting media from {} with yt-dlp", page_url);

        let result = self
            .command(page_url, output, min_filesize)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!("yt-dlp stderr: {}", stderr);
            return Err(ExtractError::Failed(stderr.trim().to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_selector_uses_floor_in_bytes() {
        assert_eq!(
            format_selector(10 * 1024 * 1024),
            "bestvideo[filesize>10485760]+bestaudio/best[filesize>10485760]"
        );
    }

    #[test]
    fn test_output_template_escapes_percent() {
        let path = PathBuf::from("/tmp/100% Real Director by X 240305.mp4");
        assert_eq!(
            output_template(&path),
            "/tmp/100%% Real Director by X 240305.mp4"
        );
    }

    #[test]
    fn test_command_arguments() {
        let cmd = YtDlp::new("yt-dlp")
            .with_proxy(Some("socks5://127.0.0.1:9050".to_string()))
            .command("https://site/item", Path::new("/tmp/out.mp4"), 42);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--quiet".to_string()));
        assert!(args.contains(&"bestvideo[filesize>42]+bestaudio/best[filesize>42]".to_string()));
        assert!(args.contains(&"socks5://127.0.0.1:9050".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://site/item"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let err = YtDlp::new("/nonexistent/yt-dlp-binary")
            .download("https://site/item", Path::new("/tmp/never.mp4"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Spawn { .. }));
    }
}
