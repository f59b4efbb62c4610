//! Visibility and data-presence tests, memoized per node.

use std::collections::HashMap;

use scraper::ElementRef;

use crate::invoice::rules::{
    field_for_key, is_amount_token, normalize_digits, AMOUNT_WITH_CURRENCY, IDENTIFIER,
};
use crate::models::Field;

use super::{element_text, node_key};

/// Per-scan memo of row checks. Rows are often matched by several selector
/// patterns; each node is judged once.
///
/// Nodes are keyed by their address inside the parsed tree, so a memo must
/// not outlive the document it was filled from.
#[derive(Debug, Default)]
pub struct ScanMemo {
    visible: HashMap<usize, bool>,
    has_data: HashMap<usize, bool>,
}

impl ScanMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the element and all its ancestors are rendered.
    ///
    /// A snapshot carries no layout, so "rendered" means: no `hidden`
    /// attribute, no `aria-hidden="true"`, no hiding class, and no inline
    /// style that hides it or collapses it to zero size.
    pub fn is_visible(&mut self, el: ElementRef<'_>) -> bool {
        if let Some(known) = self.visible.get(&node_key(el)) {
            return *known;
        }

        let visible = !hides_itself(el)
            && match el.parent().and_then(ElementRef::wrap) {
                Some(parent) => self.is_visible(parent),
                None => true,
            };

        self.visible.insert(node_key(el), visible);
        visible
    }

    /// Whether a row carries something worth extracting: an identifier-shaped
    /// token, an amount, or a cell declared as an invoice number.
    pub fn has_data(&mut self, row: ElementRef<'_>) -> bool {
        if let Some(known) = self.has_data.get(&node_key(row)) {
            return *known;
        }

        let text = normalize_digits(&element_text(row));
        let has_data = IDENTIFIER.is_match(&text)
            || AMOUNT_WITH_CURRENCY.is_match(&text)
            || text.split_whitespace().any(is_amount_token)
            || declares_invoice_number(row);

        self.has_data.insert(node_key(row), has_data);
        has_data
    }
}

fn hides_itself(el: ElementRef<'_>) -> bool {
    let element = el.value();

    if element.attr("hidden").is_some() {
        return true;
    }
    if element.attr("aria-hidden") == Some("true") {
        return true;
    }
    if element.name() == "input" && element.attr("type") == Some("hidden") {
        return true;
    }
    if element
        .classes()
        .any(|c| matches!(c, "hidden" | "d-none" | "is-hidden"))
    {
        return true;
    }

    match element.attr("style") {
        Some(style) => style_hides(style),
        None => false,
    }
}

fn style_hides(style: &str) -> bool {
    let style: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    let declarations: Vec<&str> = style.split(';').collect();
    let has = |decl: &str| declarations.iter().any(|d| *d == decl);
    let zero = |prop: &str| {
        declarations.iter().any(|d| {
            d.strip_prefix(prop)
                .and_then(|v| v.strip_prefix(':'))
                .is_some_and(|v| matches!(v, "0" | "0px" | "0%" | "0em" | "0rem"))
        })
    };

    has("display:none") || has("visibility:hidden") || (zero("width") || zero("height"))
}

fn declares_invoice_number(row: ElementRef<'_>) -> bool {
    row.descendants().filter_map(ElementRef::wrap).any(|cell| {
        let element = cell.value();
        ["data-field", "data-automation-key", "data-column", "data-label"]
            .iter()
            .filter_map(|a| element.attr(a))
            .any(|key| {
                matches!(
                    field_for_key(key),
                    Some(Field::InternalNumber | Field::ElectronicNumber)
                )
            })
            && !element_text(cell).is_empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn test_hidden_ancestor_hides_row() {
        let doc = Html::parse_document(
            r#"<div style="display: none"><table><tbody><tr id="a"><td>1,140.00</td></tr></tbody></table></div>
               <table><tbody><tr id="b"><td>1,140.00</td></tr></tbody></table>"#,
        );
        let mut memo = ScanMemo::new();

        assert!(!memo.is_visible(first(&doc, "#a")));
        assert!(memo.is_visible(first(&doc, "#b")));
    }

    #[test]
    fn test_zero_size_and_attributes() {
        let doc = Html::parse_document(
            r#"<p id="w" style="width:0px">x</p>
               <p id="h" hidden>x</p>
               <p id="aria" aria-hidden="true">x</p>
               <p id="ok" style="width: 120px">x</p>"#,
        );
        let mut memo = ScanMemo::new();

        assert!(!memo.is_visible(first(&doc, "#w")));
        assert!(!memo.is_visible(first(&doc, "#h")));
        assert!(!memo.is_visible(first(&doc, "#aria")));
        assert!(memo.is_visible(first(&doc, "#ok")));
    }

    #[test]
    fn test_data_presence() {
        let doc = Html::parse_document(
            r#"<table><tbody>
                 <tr id="data"><td>INV-1</td><td>114.00</td></tr>
                 <tr id="keyed"><td data-field="internalNumber">A1</td></tr>
                 <tr id="empty"><td>No documents found</td></tr>
               </tbody></table>"#,
        );
        let mut memo = ScanMemo::new();

        assert!(memo.has_data(first(&doc, "#data")));
        assert!(memo.has_data(first(&doc, "#keyed")));
        assert!(!memo.has_data(first(&doc, "#empty")));
    }
}
