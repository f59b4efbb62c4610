//! Finding the pager controls to click.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html};

use crate::dom::{element_text, ElementTarget, NamedSelector, ScanMemo};
use crate::invoice::rules::normalize_digits;

use super::locate::pager_regions;

lazy_static! {
    /// Controls that are a "next page" button by construction.
    static ref NEXT_CONTROLS: Vec<NamedSelector> = [
        r#"[data-testid="next-page"]"#,
        r#"[aria-label="Next page"]"#,
        r#"[aria-label="Go to next page"]"#,
        r#"[aria-label="الصفحة التالية"]"#,
        ".pagination-next",
        ".page-next",
        ".next-page",
        ".ms-Pagination-next",
        "li.next > a",
        "li.next > button",
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();

    static ref FIRST_CONTROLS: Vec<NamedSelector> = [
        r#"[data-testid="first-page"]"#,
        r#"[aria-label="First page"]"#,
        r#"[aria-label="Go to first page"]"#,
        r#"[aria-label="الصفحة الأولى"]"#,
        ".pagination-first",
        ".page-first",
        ".first-page",
        "li.first > a",
        "li.first > button",
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();

    /// Anything clickable.
    static ref CLICKABLE: NamedSelector = NamedSelector::new(r#"button, a, [role="button"]"#);
}

const NEXT_TOKENS: &[&str] = &["next", "›", "»", "التالي", "التالى"];
const FIRST_TOKENS: &[&str] = &["first", "«", "الأولى", "الاولى"];

/// How a control was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// A dedicated pager control.
    Structural,
    /// A numbered page button.
    Numbered,
    /// A control labelled with a next/first word or arrow.
    Labelled,
}

/// A control to click, and how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerControl {
    pub target: ElementTarget,
    pub kind: ControlKind,
}

/// Locate the "next page" control for a listing on page `current`.
///
/// Tried in order: dedicated next controls, the numbered control for
/// `current + 1` inside the pager, any control labelled with a next token.
pub fn find_next(doc: &Html, current: u32) -> Option<PagerControl> {
    let mut memo = ScanMemo::new();
    let wanted = current.saturating_add(1).to_string();

    structural(doc, &NEXT_CONTROLS, &mut memo)
        .or_else(|| numbered(doc, &wanted, &mut memo))
        .or_else(|| labelled(doc, NEXT_TOKENS, &mut memo))
}

/// Locate the control that returns to page 1.
pub fn find_first(doc: &Html) -> Option<PagerControl> {
    let mut memo = ScanMemo::new();

    structural(doc, &FIRST_CONTROLS, &mut memo)
        .or_else(|| numbered(doc, "1", &mut memo))
        .or_else(|| labelled(doc, FIRST_TOKENS, &mut memo))
}

fn structural(doc: &Html, controls: &[NamedSelector], memo: &mut ScanMemo) -> Option<PagerControl> {
    controls.iter().find_map(|named| {
        doc.select(&named.selector)
            .enumerate()
            .find(|(_, el)| usable(*el, memo))
            .map(|(index, _)| PagerControl {
                target: ElementTarget::new(named.css, index),
                kind: ControlKind::Structural,
            })
    })
}

fn numbered(doc: &Html, label: &str, memo: &mut ScanMemo) -> Option<PagerControl> {
    let regions = pager_regions(doc, memo);
    if regions.is_empty() {
        return None;
    }

    doc.select(&CLICKABLE.selector)
        .enumerate()
        .find(|(_, el)| {
            normalize_digits(&element_text(*el)) == label
                && el
                    .ancestors()
                    .any(|a| regions.iter().any(|r| a == **r))
                && usable(*el, memo)
        })
        .map(|(index, _)| PagerControl {
            target: ElementTarget::new(CLICKABLE.css, index),
            kind: ControlKind::Numbered,
        })
}

fn labelled(doc: &Html, tokens: &[&str], memo: &mut ScanMemo) -> Option<PagerControl> {
    doc.select(&CLICKABLE.selector)
        .enumerate()
        .find(|(_, el)| {
            let element = el.value();
            let labels = [
                Some(element_text(*el)),
                element.attr("aria-label").map(str::to_string),
                element.attr("title").map(str::to_string),
            ];
            labels
                .iter()
                .flatten()
                .any(|label| matches_token(label, tokens))
                && usable(*el, memo)
        })
        .map(|(index, _)| PagerControl {
            target: ElementTarget::new(CLICKABLE.css, index),
            kind: ControlKind::Labelled,
        })
}

fn matches_token(label: &str, tokens: &[&str]) -> bool {
    let label = label.trim().to_lowercase();
    !label.is_empty()
        && tokens.iter().any(|t| {
            label == *t || label.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation()).any(|w| w == *t)
        })
}

/// Visible and not disabled, either itself or through a disabled list item.
fn usable(el: ElementRef<'_>, memo: &mut ScanMemo) -> bool {
    memo.is_visible(el) && !is_disabled(el)
}

fn is_disabled(el: ElementRef<'_>) -> bool {
    let disabled = |e: ElementRef<'_>| {
        let v = e.value();
        v.attr("disabled").is_some()
            || v.attr("aria-disabled") == Some("true")
            || v.classes().any(|c| c == "disabled" || c.ends_with("-disabled") || c == "is-disabled")
    };

    disabled(el)
        || el
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| p.value().name() == "li" && disabled(p))
}
