//! Shared helpers for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;

use crate::config::Settings;
use crate::models::{ListingEntry, ScanWindow};
use crate::scrapers::{ChromiumLauncher, SessionLauncher};

/// Days covered when no window is given.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Build the scan window from optional `--from`/`--to` flags.
///
/// Missing `--to` means today; missing `--from` means seven days before `--to`.
pub fn resolve_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> anyhow::Result<ScanWindow> {
    let end = to.unwrap_or(today);
    match from {
        Some(start) => Ok(ScanWindow::new(start, end)?),
        None => Ok(ScanWindow::last_days(end, DEFAULT_WINDOW_DAYS)),
    }
}

/// Keep selected entries, narrowed to the 1-based `only` positions if given.
///
/// Positions count over the full listing, matching the numbers `scan` prints.
pub fn select_entries(entries: Vec<ListingEntry>, only: &[usize]) -> Vec<ListingEntry> {
    entries
        .into_iter()
        .enumerate()
        .filter(|(i, e)| e.selected && (only.is_empty() || only.contains(&(i + 1))))
        .map(|(_, e)| e)
        .collect()
}

/// Load a listing previously written by `scan --json`.
pub fn read_listing(path: &Path) -> anyhow::Result<Vec<ListingEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read listing {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid listing file {}", path.display()))
}

pub fn write_listing(path: &Path, entries: &[ListingEntry]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write listing {}", path.display()))
}

/// Browser launcher configured from settings.
pub fn browser_launcher(settings: &Settings) -> Arc<dyn SessionLauncher> {
    Arc::new(ChromiumLauncher::new(
        settings.browser.clone(),
        settings.resolve.user_agent.clone(),
        settings.resolve.max_observed_responses,
    ))
}
