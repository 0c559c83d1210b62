//! Download command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use console::style;
use tokio::sync::mpsc;

use super::scan::{print_entries, run_scan};
use crate::cli::helpers::{browser_launcher, read_listing, resolve_window, select_entries};
use crate::cli::icons::{dim_arrow, error, info, success, warn};
use crate::cli::progress::{outcome_line, BatchProgress};
use crate::config::Settings;
use crate::scrapers::HttpClient;
use crate::services::{
    DownloadConfig, DownloadEvent, DownloadService, DownloadStrategy, ItemPipeline,
    MediaResolver, YtDlp,
};

pub struct DownloadArgs {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub listing: Option<PathBuf>,
    pub only: Vec<usize>,
    pub workers: Option<usize>,
    pub dry_run: bool,
    pub progress: bool,
}

pub async fn cmd_download(settings: &Settings, args: DownloadArgs) -> anyhow::Result<()> {
    let entries = match args.listing {
        Some(ref path) => read_listing(path)?,
        None => {
            let window = resolve_window(args.from, args.to, Local::now().date_naive())?;
            println!("{} Scanning {} to {}", info(), window.start(), window.end());
            run_scan(settings, window).await?
        }
    };

    print_entries(&entries);
    let listed = entries.len();
    let entries = select_entries(entries, &args.only);
    if entries.is_empty() {
        println!("{} Nothing selected for download", warn());
        return Ok(());
    }
    println!("{} Selected {} of {} entries", info(), entries.len(), listed);

    settings.ensure_directories()?;
    let directory = settings.download_dir();
    let workers = args.workers.unwrap_or(settings.download.workers).max(1);
    let size_floor = settings.download.size_floor;
    let config = DownloadConfig {
        workers,
        batch_pause: Duration::from_millis(settings.download.batch_pause_ms),
        item_pause: Duration::from_millis(settings.download.item_pause_ms),
    };

    let launcher = browser_launcher(settings);
    let resolver = MediaResolver::new(launcher, settings.resolve.clone(), size_floor);
    let fetcher = HttpClient::new(
        &settings.resolve.user_agent,
        Duration::from_secs(settings.download.connect_timeout),
        settings.browser.proxy.as_deref(),
    )?;
    let extractor = YtDlp::new(settings.download.ytdlp_binary.clone())
        .with_proxy(settings.browser.proxy.clone());
    let strategy = DownloadStrategy::new(Arc::new(fetcher), Arc::new(extractor), size_floor);
    let pipeline = ItemPipeline::new(resolver, strategy, directory.clone()).dry_run(args.dry_run);

    let total = entries.len();
    println!(
        "{} Processing {} entries with {} workers into {}",
        info(),
        total,
        workers,
        directory.display()
    );

    let service = DownloadService::new(Arc::new(pipeline), config);

    // Event channel for progress updates
    let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);

    let progress_display = args.progress.then(|| Arc::new(BatchProgress::new(total)));

    // Spawn event handler task (UI layer)
    let progress_clone = progress_display.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                DownloadEvent::Started { index, title } => {
                    if let Some(ref progress) = progress_clone {
                        progress.start(index, &title).await;
                    }
                }
                DownloadEvent::Completed {
                    index,
                    completed,
                    total,
                    outcome,
                } => match progress_clone {
                    Some(ref progress) => progress.finish(index, completed, &outcome).await,
                    None => println!(
                        "{} {}",
                        style(format!("[{}/{}]", completed, total)).dim(),
                        outcome_line(&outcome)
                    ),
                },
            }
        }
    });

    let report = service.run(entries, event_tx).await;
    let _ = event_handler.await;
    if let Some(ref progress) = progress_display {
        progress.finish_all();
    }

    println!();
    println!(
        "{} {} succeeded, {} failed",
        success(),
        report.succeeded(),
        report.failed()
    );
    for (entry, outcome) in report.outcomes.iter().filter(|(_, o)| !o.success) {
        println!("  {} {}: {}", dim_arrow(), entry.title, outcome.message);
    }

    if let Some(fatal) = report.fatal {
        println!(
            "{} Batch halted, {} entries not attempted:",
            error(),
            report.skipped.len()
        );
        for entry in &report.skipped {
            println!("  {} {}", dim_arrow(), entry.title);
        }
        return Err(fatal.into());
    }

    Ok(())
}
