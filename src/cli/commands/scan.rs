//! Listing scan command.

use std::path::Path;

use chrono::{Local, NaiveDate};
use console::style;
use indicatif::ProgressBar;
use tokio::sync::mpsc;

use crate::cli::helpers::{browser_launcher, resolve_window, write_listing};
use crate::cli::icons::{dim_arrow, info, success, warn};
use crate::cli::progress::scan_spinner;
use crate::config::Settings;
use crate::models::{ListingEntry, ScanWindow};
use crate::services::{ScanEvent, Scanner};

/// Scan `window` while rendering progress on a spinner.
pub(super) async fn run_scan(
    settings: &Settings,
    window: ScanWindow,
) -> anyhow::Result<Vec<ListingEntry>> {
    let scanner = Scanner::new(browser_launcher(settings), settings.scan.clone());
    let (event_tx, mut event_rx) = mpsc::channel::<ScanEvent>(32);

    let spinner = scan_spinner();
    let spinner_clone = spinner.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            render_scan_event(&spinner_clone, &event);
        }
    });

    let today = Local::now().date_naive();
    let result = scanner.scan(window, today, Some(event_tx)).await;
    let _ = event_handler.await;
    spinner.finish_and_clear();

    Ok(result?)
}

fn render_scan_event(spinner: &ProgressBar, event: &ScanEvent) {
    match event {
        ScanEvent::RoundStarted { round } => {
            spinner.set_message(format!("Loading page {}", round));
        }
        ScanEvent::RoundScanned {
            found,
            oldest: Some(oldest),
            ..
        } => {
            spinner.set_message(format!("Found {} entries (oldest on page: {})", found, oldest));
        }
        ScanEvent::RoundScanned { found, .. } => {
            spinner.set_message(format!("Found {} entries", found));
        }
        ScanEvent::BoundaryReached { .. } => {
            spinner.println(format!(
                "{} Reached the start of the window, loading one more page",
                dim_arrow()
            ));
        }
        ScanEvent::Finished { .. } => {}
    }
}

/// Print a numbered listing table.
pub(super) fn print_entries(entries: &[ListingEntry]) {
    for (i, entry) in entries.iter().enumerate() {
        let skipped = if entry.selected {
            String::new()
        } else {
            format!("  {}", style("(deselected)").dim())
        };
        println!(
            "{:>4}  {}  {}{}",
            style(i + 1).dim(),
            entry.published_date,
            entry.title,
            skipped
        );
        println!("      {}", style(&entry.link).dim());
    }
}

pub async fn cmd_scan(
    settings: &Settings,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: Option<&Path>,
) -> anyhow::Result<()> {
    let window = resolve_window(from, to, Local::now().date_naive())?;
    println!(
        "{} Scanning {} to {}",
        info(),
        window.start(),
        window.end()
    );

    let entries = run_scan(settings, window).await?;
    if entries.is_empty() {
        println!("{} No entries found in this window", warn());
        return Ok(());
    }

    print_entries(&entries);
    println!("{} Found {} entries", success(), entries.len());

    if let Some(path) = json {
        write_listing(path, &entries)?;
        println!(
            "  {} Listing written to {} (set \"selected\": false to skip an entry)",
            dim_arrow(),
            path.display()
        );
    }

    Ok(())
}
