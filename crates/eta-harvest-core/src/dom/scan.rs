//! Structural scan of rendered listing rows.

use std::collections::HashMap;

use lazy_static::lazy_static;
use rayon::prelude::*;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::invoice::{InvoiceExtractor, RecordExtractor, RecordSource, RowData};
use crate::models::InvoiceRecord;

use super::{element_text, node_key, NamedSelector, ScanMemo};

lazy_static! {
    /// Row patterns specific to the portal's listing, most specific first.
    pub static ref PRIMARY_ROWS: Vec<NamedSelector> = [
        r#"[data-testid="invoice-row"]"#,
        ".invoice-row",
        ".document-row",
        ".ms-DetailsRow",
        "table tbody tr",
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();

    /// Generic row patterns, tried only when no primary pattern matched.
    pub static ref SECONDARY_ROWS: Vec<NamedSelector> = [
        r#"tr[role="row"]"#,
        r#"[role="row"]"#,
        "table tr",
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();

    /// Cell patterns within a row; the first one with matches is used.
    pub static ref CELL_SELECTORS: Vec<NamedSelector> = [
        "td",
        r#"[role="gridcell"]"#,
        ".ms-DetailsRow-cell",
        r#"[data-testid$="-cell"]"#,
        ".cell",
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();

    static ref HEADER_CELLS: Selector = Selector::parse(r#"thead th, [role="columnheader"]"#).unwrap();
}

/// Attributes a cell may use to declare what it holds, in priority order.
const KEY_ATTRIBUTES: &[&str] = &[
    "data-field",
    "data-automation-key",
    "data-column",
    "data-label",
    "headers",
];

/// Rows accepted by one scan, with the pattern that matched them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowScan {
    pub selector: &'static str,
    pub rows: Vec<RowData>,
}

impl RowScan {
    /// Run the extractor over every row, in parallel, keeping row order.
    pub fn extract(&self, extractor: &RecordExtractor) -> Vec<InvoiceRecord> {
        self.rows
            .par_iter()
            .map(|row| extractor.extract(RecordSource::Row(row)))
            .collect()
    }
}

/// Scan the document for listing rows.
///
/// Patterns are tried in order; the first one yielding at least one visible
/// row with data wins and only its passing rows are returned. `None` when no
/// pattern matched anything.
pub fn scan_rows(doc: &Html, memo: &mut ScanMemo) -> Option<RowScan> {
    for named in PRIMARY_ROWS.iter().chain(SECONDARY_ROWS.iter()) {
        let accepted: Vec<ElementRef<'_>> = doc
            .select(&named.selector)
            .filter(|row| memo.is_visible(*row) && memo.has_data(*row))
            .collect();
        if accepted.is_empty() {
            continue;
        }

        let mut headers = HeaderCache::default();
        let rows: Vec<RowData> = accepted
            .into_iter()
            .enumerate()
            .map(|(index, row)| build_row(index, row, &mut headers))
            .collect();

        debug!(selector = named.css, rows = rows.len(), "Structural scan matched");
        return Some(RowScan {
            selector: named.css,
            rows,
        });
    }

    debug!("Structural scan found no rows");
    None
}

/// Whether the listing has rendered: some row pattern has a visible row with data.
pub fn has_rendered_rows(doc: &Html) -> bool {
    let mut memo = ScanMemo::new();
    PRIMARY_ROWS
        .iter()
        .chain(SECONDARY_ROWS.iter())
        .any(|named| {
            doc.select(&named.selector)
                .any(|row| memo.is_visible(row) && memo.has_data(row))
        })
}

/// Column headers per enclosing table or grid, resolved once per scan.
#[derive(Default)]
struct HeaderCache {
    by_container: HashMap<usize, Vec<String>>,
}

impl HeaderCache {
    fn headers_for(&mut self, row: ElementRef<'_>) -> &[String] {
        let container = row.ancestors().filter_map(ElementRef::wrap).find(|el| {
            el.value().name() == "table"
                || matches!(el.value().attr("role"), Some("grid" | "table" | "treegrid"))
        });

        let Some(container) = container else {
            return &[];
        };

        self.by_container
            .entry(node_key(container))
            .or_insert_with(|| container.select(&HEADER_CELLS).map(element_text).collect())
    }
}

fn build_row(index: usize, row: ElementRef<'_>, headers: &mut HeaderCache) -> RowData {
    let cells: Vec<ElementRef<'_>> = CELL_SELECTORS
        .iter()
        .map(|named| row.select(&named.selector).collect::<Vec<_>>())
        .find(|cells| !cells.is_empty())
        .unwrap_or_default();

    let headers = headers.headers_for(row);
    let mut keyed = Vec::new();
    let mut texts = Vec::with_capacity(cells.len());

    for (column, cell) in cells.iter().enumerate() {
        let text = element_text(*cell);
        let declared = KEY_ATTRIBUTES
            .iter()
            .filter_map(|a| cell.value().attr(a))
            .map(str::trim)
            .find(|k| !k.is_empty());
        let key = declared.or_else(|| {
            headers
                .get(column)
                .map(String::as_str)
                .filter(|h| !h.is_empty())
        });

        if let Some(key) = key {
            keyed.push((key.to_string(), text.clone()));
        }
        texts.push(text);
    }

    RowData {
        index,
        keyed,
        cells: texts,
        text: element_text(row),
    }
}
