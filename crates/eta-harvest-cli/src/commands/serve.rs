//! Serve command - answer JSON requests line by line.
//!
//! Each stdin line is one request; each response is written as one stdout
//! line. Progress of a running harvest is written in between as
//! `{"action": "progressUpdate", "progress": {...}}` lines.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use eta_harvest_core::{NetworkTap, ProgressUpdate, ReplayDriver, Service};

use super::{config, snapshots};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Directory holding page-*.html snapshots
    #[arg(required = true)]
    dir: PathBuf,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(config_path)?;
    let pages = snapshots::load_pages(&args.dir)?;
    info!("Serving {} recorded pages from {}", pages.len(), args.dir.display());

    let tap = Arc::new(NetworkTap::from_config(&config));
    let driver = Arc::new(ReplayDriver::new(pages).with_tap(tap.clone()));
    let service = Service::new(driver, tap, config);

    let progress = |update: &ProgressUpdate| {
        // A closed stdout ends the session at the next response anyway.
        let _ = emit(&json!({"action": "progressUpdate", "progress": update}));
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("Request: {}", line);

        let response = service.handle_json(line, &progress).await;
        emit(&serde_json::to_value(&response)?)?;
    }

    Ok(())
}

fn emit(value: &Value) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", value)?;
    stdout.flush()
}
