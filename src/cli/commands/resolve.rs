//! Single-page resolution command.

use chrono::Local;

use crate::cli::helpers::browser_launcher;
use crate::cli::icons::{dim_arrow, error, success, warn};
use crate::config::Settings;
use crate::services::naming::{build_filename, final_title, DEFAULT_EXTENSION};
use crate::services::MediaResolver;

pub async fn cmd_resolve(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let resolver = MediaResolver::new(
        browser_launcher(settings),
        settings.resolve.clone(),
        settings.download.size_floor,
    );

    let result = resolver.resolve(url).await?;
    if let Some(ref err) = result.error {
        println!("{} {}", error(), err);
        return Ok(());
    }

    match result.video_url {
        Some(ref video_url) => println!("{} Video: {}", success(), video_url),
        None => println!(
            "{} No full-size video observed, the extractor fallback would be used",
            warn()
        ),
    }
    println!(
        "  {} Title: {}",
        dim_arrow(),
        result.exact_title.as_deref().unwrap_or("(none)")
    );
    println!("  {} Director: {}", dim_arrow(), result.author);

    let title = final_title(result.exact_title.as_deref(), "untitled");
    let filename = build_filename(
        title,
        &result.author,
        Local::now().date_naive(),
        DEFAULT_EXTENSION,
    );
    println!("  {} Filename: {}", dim_arrow(), filename);

    Ok(())
}
