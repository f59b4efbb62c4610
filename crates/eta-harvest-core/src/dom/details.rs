//! Line items from a rendered invoice details table.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

use crate::invoice::line_item_from_pairs;
use crate::models::LineItemDetail;

use super::{element_text, NamedSelector, ScanMemo};

lazy_static! {
    static ref DETAIL_TABLES: Vec<NamedSelector> = [
        r#"[data-testid="invoice-lines"]"#,
        ".invoice-lines",
        "table.line-items",
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();

    static ref HEADER: Selector = Selector::parse("thead th, tr th").unwrap();
    static ref BODY_ROWS: Selector = Selector::parse("tr").unwrap();
    static ref CELLS: Selector = Selector::parse("td").unwrap();
}

/// Lines of the invoice shown in the document, if it is the one asked for.
///
/// The document must mention `invoice_id` somewhere; a details table left
/// over from another invoice is not reported.
pub fn scan_line_items(doc: &Html, invoice_id: &str) -> Vec<LineItemDetail> {
    if invoice_id.is_empty() || !doc.html().contains(invoice_id) {
        return Vec::new();
    }

    let mut memo = ScanMemo::new();
    for named in DETAIL_TABLES.iter() {
        let Some(table) = doc.select(&named.selector).find(|t| memo.is_visible(*t)) else {
            continue;
        };
        let lines = table_lines(table, &mut memo);
        if !lines.is_empty() {
            return lines;
        }
    }
    Vec::new()
}

fn table_lines(table: ElementRef<'_>, memo: &mut ScanMemo) -> Vec<LineItemDetail> {
    let headers: Vec<String> = table.select(&HEADER).map(element_text).collect();
    if headers.is_empty() {
        return Vec::new();
    }

    table
        .select(&BODY_ROWS)
        .filter(|row| memo.is_visible(*row))
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&CELLS).map(element_text).collect();
            if cells.is_empty() {
                return None;
            }
            let line = line_item_from_pairs(
                headers
                    .iter()
                    .zip(cells.iter())
                    .map(|(h, c)| (h.as_str(), c.as_str())),
            );
            (!line.is_empty()).then_some(line)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"
        <h2>Document 7NBY3R0PQ9XG1W5JZ2KDV6M8TA</h2>
        <table class="line-items">
          <thead><tr><th>Item Code</th><th>Description</th><th>Quantity</th><th>Unit Price</th><th>Total</th></tr></thead>
          <tbody>
            <tr><td>EG-1</td><td>Paper</td><td>10</td><td>5.00</td><td>57.00</td></tr>
            <tr><td>EG-2</td><td>Toner</td><td>1</td><td>50.00</td><td>57.00</td></tr>
          </tbody>
        </table>"#;

    #[test]
    fn test_scan_details_table() {
        let doc = Html::parse_document(PAGE);

        let lines = scan_line_items(&doc, "7NBY3R0PQ9XG1W5JZ2KDV6M8TA");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].item_code, "EG-1");
        assert_eq!(lines[0].description, "Paper");
        assert_eq!(lines[1].unit_price, "50.00");
    }

    #[test]
    fn test_details_for_other_invoice_are_ignored() {
        let doc = Html::parse_document(PAGE);
        assert!(scan_line_items(&doc, "SOMEOTHERDOCUMENT0000000000").is_empty());
    }
}
