//! Progress display for scans and concurrent downloads.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

use crate::models::DownloadOutcome;

use super::icons;

/// Spinner shown while the listing is paginated.
pub fn scan_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message("Opening listing");
    bar
}

/// Summary bar plus one spinner per in-flight entry.
pub struct BatchProgress {
    multi: MultiProgress,
    summary_bar: ProgressBar,
    active: Mutex<HashMap<usize, ProgressBar>>,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        let multi = MultiProgress::new();

        let summary_bar = multi.add(ProgressBar::new(total as u64));
        summary_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        summary_bar.set_message("Downloading");

        Self {
            multi,
            summary_bar,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Show a spinner for an entry a worker picked up.
    pub async fn start(&self, index: usize, title: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {wide_msg}")
                .unwrap(),
        );
        bar.set_message(truncate_title(title, 50));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.active.lock().await.insert(index, bar);
    }

    /// Replace the entry's spinner with its outcome line.
    pub async fn finish(&self, index: usize, completed: usize, outcome: &DownloadOutcome) {
        if let Some(bar) = self.active.lock().await.remove(&index) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.summary_bar.set_position(completed as u64);
        let _ = self.multi.println(outcome_line(outcome));
    }

    pub fn finish_all(&self) {
        self.summary_bar.finish_with_message("Done");
    }
}

/// One line describing a terminal outcome.
pub fn outcome_line(outcome: &DownloadOutcome) -> String {
    let icon = if outcome.success {
        icons::success()
    } else {
        icons::error()
    };
    format!("{} {} ({})", icon, outcome.final_filename, outcome.message)
}

/// Shorten a title to `max_len` characters for display.
fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short", 10), "short");
        assert_eq!(truncate_title("a very long title here", 10), "a very ...");
        assert_eq!(truncate_title("日本語のタイトルです", 5), "日本...");
    }

    #[test]
    fn test_outcome_line_mentions_message() {
        let line = outcome_line(&DownloadOutcome::failure("failed: nope", "Clip.mp4"));
        assert!(line.contains("Clip.mp4"));
        assert!(line.contains("failed: nope"));
    }
}
