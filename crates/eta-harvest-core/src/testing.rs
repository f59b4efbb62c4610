//! Fixture documents and helpers shared by the tests.

use std::ops::RangeInclusive;
use std::sync::Mutex;

use serde_json::json;

use crate::harvest::{ProgressSink, ProgressUpdate};

pub const LISTING_URL: &str =
    "https://invoicing.eta.gov.eg/api/v1/documents/recent?page=1&pageSize=10";

/// Document UUID of invoice `n`: 26 uppercase alphanumerics.
pub fn uuid(n: u32) -> String {
    format!("DOC{n:023}")
}

fn row(n: u32) -> String {
    format!(
        "<tr><td>{}</td><td>INV-{n:04}</td><td>15/01/2024</td><td>Valid</td><td>{}.00 EGP</td></tr>",
        uuid(n),
        u64::from(n) * 114
    )
}

fn table(range: RangeInclusive<u32>) -> String {
    let rows: String = range.map(row).collect();
    format!(
        "<table>\
           <thead><tr><th>Electronic Number</th><th>Internal Number</th><th>Issue Date</th><th>Status</th><th>Total</th></tr></thead>\
           <tbody>{rows}</tbody>\
         </table>"
    )
}

/// A listing page without a pager.
pub fn listing_page(range: RangeInclusive<u32>, results: Option<u64>) -> String {
    let summary = results
        .map(|n| format!("<div class=\"summary\">Results: {n}</div>"))
        .unwrap_or_default();
    format!("<html><body>{summary}{}</body></html>", table(range))
}

/// A listing page showing page `current` with a next control, disabled on the last page.
pub fn paged_listing(range: RangeInclusive<u32>, results: u64, current: u32, last: bool) -> String {
    let next = if last {
        "<button class=\"next-page\" disabled>Next</button>"
    } else {
        "<button class=\"next-page\">Next</button>"
    };
    format!(
        "<html><body>\
           <div class=\"summary\">Results: {results}</div>\
           {}\
           <div class=\"pagination\"><span aria-current=\"page\">{current}</span>{next}</div>\
         </body></html>",
        table(range)
    )
}

/// An ETA-style listing response for invoices in `range`.
pub fn listing_json(range: RangeInclusive<u32>, total: u64) -> String {
    let result: Vec<_> = range
        .map(|n| {
            json!({
                "uuid": uuid(n),
                "internalId": format!("INV-{n:04}"),
                "dateTimeIssued": "2024-01-15T10:30:00Z",
                "status": "Valid",
                "total": u64::from(n) * 114,
            })
        })
        .collect();
    json!({
        "result": result,
        "metadata": {"totalCount": total, "totalPages": total.div_ceil(10)}
    })
    .to_string()
}

/// Collects every progress update.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, update: &ProgressUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}
