//! Per-cycle page snapshot.

use serde::{Deserialize, Serialize};

use super::record::InvoiceRecord;

/// Where the records of a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// An intercepted listing response.
    Network,
    /// A scan of the rendered document.
    #[serde(rename = "dom")]
    Structural,
}

/// Pagination facts observed on one page, each optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageHints {
    pub total_count: Option<u64>,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageHints {
    pub fn is_empty(&self) -> bool {
        self.total_count.is_none()
            && self.current_page.is_none()
            && self.total_pages.is_none()
            && self.page_size.is_none()
    }
}

/// The valid records extracted from one page view.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// Records in row order, serials numbered from 1.
    pub records: Vec<InvoiceRecord>,
    /// Page the snapshot was taken from, as far as it is known.
    pub page_index: u32,
    pub source: ExtractionSource,
    /// Pagination observed while taking the snapshot.
    pub hints: PageHints,
}

impl PageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cheap fingerprint of the leading records, used for stuck-page detection.
    pub fn signature(&self) -> String {
        let leading: Vec<String> = self
            .records
            .iter()
            .take(3)
            .map(|r| r.identity_key())
            .collect();
        leading.join("\u{1f}")
    }
}
