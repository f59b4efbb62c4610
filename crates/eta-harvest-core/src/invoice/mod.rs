//! Invoice field extraction module.

mod extractor;
mod lines;
pub mod rules;

pub use extractor::RecordExtractor;
pub use lines::{line_item_from_pairs, line_item_from_value, line_items_from_payload};

use serde_json::Value;

use crate::models::record::InvoiceRecord;

/// Plain data pulled out of one rendered listing row.
///
/// Built from the document before extraction so that extraction itself is
/// independent of the DOM and can run on any thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowData {
    /// Position of the row on its page, 0-based.
    pub index: usize,
    /// Cells that declare what they hold: `(key, text)` in cell order.
    pub keyed: Vec<(String, String)>,
    /// Text of every cell in order.
    pub cells: Vec<String>,
    /// Whole-row text.
    pub text: String,
}

/// A record source: one rendered row or one item of an intercepted payload.
#[derive(Debug, Clone, Copy)]
pub enum RecordSource<'a> {
    Row(&'a RowData),
    Network { item: &'a Value, index: usize },
}

impl RecordSource<'_> {
    /// Position on the page, 0-based.
    pub fn index(&self) -> usize {
        match self {
            RecordSource::Row(row) => row.index,
            RecordSource::Network { index, .. } => *index,
        }
    }
}

/// Trait for invoice record extractors.
pub trait InvoiceExtractor {
    /// Extract a record; never fails, unresolved fields stay empty.
    fn extract(&self, source: RecordSource<'_>) -> InvoiceRecord;
}
