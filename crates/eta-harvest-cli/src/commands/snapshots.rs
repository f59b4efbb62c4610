//! Loading recorded listing pages from a directory.
//!
//! A recording is a set of `page-*.html` documents, replayed in name order.
//! `page-NNN.json` next to a document holds the responses captured while
//! that page rendered: one `{"url": ..., "body": ...}` object or an array of
//! them. `body` is the raw response text or the JSON value itself.

use std::fs;
use std::path::Path;

use glob::glob;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use eta_harvest_core::ReplayPage;

#[derive(Deserialize)]
struct CaptureFile {
    url: String,
    body: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Captures {
    One(CaptureFile),
    Many(Vec<CaptureFile>),
}

pub fn load_pages(dir: &Path) -> anyhow::Result<Vec<ReplayPage>> {
    if !dir.is_dir() {
        anyhow::bail!("Snapshot directory not found: {}", dir.display());
    }

    let pattern = dir.join("page-*.html");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Non UTF-8 path: {}", dir.display()))?;

    let mut paths: Vec<_> = glob(pattern)?.filter_map(|r| r.ok()).collect();
    paths.sort();

    if paths.is_empty() {
        anyhow::bail!("No page snapshots (page-*.html) found in {}", dir.display());
    }

    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let mut page = ReplayPage::html(fs::read_to_string(&path)?);

        let capture_path = path.with_extension("json");
        if capture_path.exists() {
            let captures: Captures = serde_json::from_str(&fs::read_to_string(&capture_path)?)
                .map_err(|e| anyhow::anyhow!("Invalid capture file {}: {}", capture_path.display(), e))?;
            let captures = match captures {
                Captures::One(capture) => vec![capture],
                Captures::Many(captures) => captures,
            };
            for capture in captures {
                let body = match capture.body {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                page = page.with_capture(capture.url, body);
            }
        }

        debug!(
            "Loaded {} ({} captures)",
            path.display(),
            page.captures.len()
        );
        pages.push(page);
    }

    Ok(pages)
}
