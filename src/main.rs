//! CLI entry point for the wayback-mirror tool.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use wayback_mirror::{CrawlEngine, HttpFetcher};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let policy = args.to_policy()?;
    let fetcher = Arc::new(HttpFetcher::new());

    let (engine, seed) = CrawlEngine::for_seed(&args.wayback_url, policy, fetcher)?;

    // Ctrl-C flips the cancellation flag; the loop stops at the next
    // frontier-dequeue boundary, keeping the partial mirror.
    let cancel = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current resource");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let engine = if args.quiet {
        engine
    } else {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::with_template("{spinner} {pos} fetched  {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        engine.with_progress(progress)
    };

    let report = engine.run(seed).await?;

    info!(
        fetched = report.stats.fetched(),
        failed = report.stats.failed(),
        skipped = report.stats.skipped_duplicates(),
        suppressed = report.stats.suppressed_corrupted(),
        output = %report.output_dir.display(),
        "Mirror complete"
    );

    Ok(())
}
