//! Harvest command - collect every page of a recorded listing.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use eta_harvest_core::service::{HarvestRequestOptions, ResponseData};
use eta_harvest_core::{NetworkTap, ProgressUpdate, ReplayDriver, Request, Service};

use super::{config, snapshots};

/// Arguments for the harvest command.
#[derive(Args)]
pub struct HarvestArgs {
    /// Directory holding page-*.html snapshots
    #[arg(required = true)]
    dir: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub async fn run(args: HarvestArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = config::load(config_path)?;
    let pages = snapshots::load_pages(&args.dir)?;
    info!("Replaying {} pages from {}", pages.len(), args.dir.display());

    let tap = Arc::new(NetworkTap::from_config(&config));
    let driver = Arc::new(ReplayDriver::new(pages).with_tap(tap.clone()));
    let service = Service::new(driver, tap, config);

    let cancel = service.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing current page");
            cancel.cancel();
        }
    });

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}")?
                .progress_chars("=>-"),
        );
        pb
    };
    let progress = |update: &ProgressUpdate| {
        pb.set_position(u64::from(update.percentage));
        pb.set_message(update.message.clone());
    };

    let request = Request::GetAllPagesData {
        options: Some(HarvestRequestOptions {
            max_pages: args.max_pages,
        }),
    };
    let response = service.handle(request, &progress).await;
    pb.finish_and_clear();

    let output = serde_json::to_string_pretty(&response)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    let collected = match &response.data {
        Some(ResponseData::Records(records)) => records.len(),
        _ => 0,
    };

    if !response.success {
        anyhow::bail!(
            "Harvest failed after {} invoices: {}",
            collected,
            response.error.unwrap_or_default()
        );
    }

    let reason = response
        .termination
        .map(|t| t.to_string())
        .unwrap_or_default();
    eprintln!(
        "{} Collected {} invoices in {:?} ({})",
        style("✓").green(),
        collected,
        start.elapsed(),
        reason
    );

    Ok(())
}
