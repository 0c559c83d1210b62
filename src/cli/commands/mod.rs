//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod download;
mod resolve;
mod scan;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use url::Url;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "reelfetch")]
#[command(about = "Discover and download newly published videos by date")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: discovered reelfetch.{toml,yaml,json})
    #[arg(short, long, global = true, env = "REELFETCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// List entries published inside a date window
    Scan {
        /// First day of the window (YYYY-MM-DD, default: 7 days before --to)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day of the window (YYYY-MM-DD, default: today)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Write the listing as JSON for editing before download
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Scan (or load a listing) and download the selected entries
    Download {
        /// First day of the window (YYYY-MM-DD)
        #[arg(long, conflicts_with = "listing")]
        from: Option<NaiveDate>,
        /// Last day of the window (YYYY-MM-DD)
        #[arg(long, conflicts_with = "listing")]
        to: Option<NaiveDate>,
        /// Listing JSON written by `scan --json`
        #[arg(long)]
        listing: Option<PathBuf>,
        /// Only download these entries (1-based, comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<usize>,
        /// Number of concurrent workers (default: from config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Resolve and name entries without downloading
        #[arg(long)]
        dry_run: bool,
        /// Show live progress bars
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Resolve a single entry page and show what would be downloaded
    Resolve {
        /// Entry page URL
        url: Url,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Scan { from, to, json } => {
            scan::cmd_scan(&settings, from, to, json.as_deref()).await
        }
        Commands::Download {
            from,
            to,
            listing,
            only,
            workers,
            dry_run,
            progress,
        } => {
            download::cmd_download(
                &settings,
                download::DownloadArgs {
                    from,
                    to,
                    listing,
                    only,
                    workers,
                    dry_run,
                    progress,
                },
            )
            .await
        }
        Commands::Resolve { url } => resolve::cmd_resolve(&settings, url.as_str()).await,
        Commands::Config => config_cmd::cmd_config_show(&settings),
    }
}
