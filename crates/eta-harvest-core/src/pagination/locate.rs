//! Reading pagination facts from the rendered document.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

use crate::dom::{element_text, NamedSelector, ScanMemo};
use crate::invoice::rules::{normalize_digits, PAGE_LABEL, RANGE_OF_TOTAL, RESULTS_COUNT};
use crate::models::PageHints;

lazy_static! {
    /// Containers holding the pager, most specific first.
    pub static ref PAGER_REGIONS: Vec<NamedSelector> = [
        r#"[data-testid="pagination"]"#,
        ".pagination",
        ".ms-Pagination",
        r#"[class*="pagination"]"#,
        r#"[class*="pager"]"#,
        r#"[class*="paging"]"#,
        r#"nav[aria-label]"#,
        r#"[role="navigation"]"#,
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();

    static ref RESULTS_ELEMENT: Selector = Selector::parse(".results-count").unwrap();

    static ref CURRENT_PAGE: Vec<NamedSelector> = [
        r#"[aria-current="page"]"#,
        ".current-page",
        ".page-number.active",
        ".page-item.active",
    ]
    .into_iter()
    .map(NamedSelector::new)
    .collect();
}

/// Read pagination hints from the document.
///
/// * total count from "Results: N" (English or Arabic) or `.results-count`,
///   else from "X–Y of Z" in the pager;
/// * page size from the range, except on the last page where the range is short;
/// * current page from the marked pager control, "Page N", or the range.
pub fn locate(doc: &Html) -> PageHints {
    let mut memo = ScanMemo::new();
    let pager_text = pager_regions(doc, &mut memo)
        .into_iter()
        .map(element_text)
        .collect::<Vec<_>>()
        .join(" ");
    let pager_text = normalize_digits(&pager_text);
    let body_text = normalize_digits(&element_text(doc.root_element()));

    let mut hints = PageHints::default();

    let results_element = doc
        .select(&RESULTS_ELEMENT)
        .filter(|el| memo.is_visible(*el))
        .map(|el| normalize_digits(&element_text(el)))
        .find_map(|t| first_integer(&t));
    hints.total_count = results_element.or_else(|| {
        RESULTS_COUNT
            .captures(&body_text)
            .and_then(|c| parse_integer(&c[1]))
    });

    let range = RANGE_OF_TOTAL
        .captures(&pager_text)
        .or_else(|| RANGE_OF_TOTAL.captures(&body_text))
        .and_then(|c| Some((parse_integer(&c[1])?, parse_integer(&c[2])?, parse_integer(&c[3])?)))
        .filter(|(from, to, _)| from <= to && *from > 0);

    if let Some((from, to, total)) = range {
        hints.total_count = hints.total_count.or(Some(total));
        if to < total {
            hints.page_size = u32::try_from(to - from + 1).ok();
        }
    }

    hints.current_page = marked_page(doc, &mut memo)
        .or_else(|| {
            PAGE_LABEL
                .captures(&pager_text)
                .or_else(|| PAGE_LABEL.captures(&body_text))
                .and_then(|c| c[1].parse().ok())
        })
        .or_else(|| {
            let (from, _, _) = range?;
            let size = u64::from(hints.page_size?);
            u32::try_from((from - 1) / size + 1).ok()
        })
        .filter(|p| *p > 0);

    hints
}

/// Visible pager containers, outermost matches first, without duplicates.
pub fn pager_regions<'a>(doc: &'a Html, memo: &mut ScanMemo) -> Vec<ElementRef<'a>> {
    let mut regions: Vec<ElementRef<'a>> = Vec::new();
    for named in PAGER_REGIONS.iter() {
        for region in doc.select(&named.selector) {
            if !memo.is_visible(region) {
                continue;
            }
            let nested = regions
                .iter()
                .any(|r| *r == region || region.ancestors().any(|a| a == **r));
            if !nested {
                regions.push(region);
            }
        }
    }
    regions
}

fn marked_page(doc: &Html, memo: &mut ScanMemo) -> Option<u32> {
    CURRENT_PAGE.iter().find_map(|named| {
        doc.select(&named.selector)
            .filter(|el| memo.is_visible(*el))
            .find_map(|el| {
                let text = normalize_digits(&element_text(el));
                first_integer(&text).and_then(|n| u32::try_from(n).ok())
            })
    })
}

fn first_integer(text: &str) -> Option<u64> {
    text.split(|c: char| !(c.is_ascii_digit() || c == ','))
        .find(|t| t.chars().any(|c| c.is_ascii_digit()))
        .and_then(parse_integer)
}

fn parse_integer(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_results_count() {
        let doc = Html::parse_document("<div class=\"summary\">Results: 23</div>");
        let hints = locate(&doc);

        assert_eq!(hints.total_count, Some(23));
        assert_eq!(hints.page_size, None);
        assert_eq!(hints.current_page, None);
    }

    #[test]
    fn test_arabic_results_count() {
        let doc = Html::parse_document("<span>النتائج: ١٢٣</span>");
        assert_eq!(locate(&doc).total_count, Some(123));
    }

    #[test]
    fn test_range_in_pager() {
        let doc = Html::parse_document(
            r#"<div class="pagination">
                 <span>11 - 20 of 1,234</span>
                 <button>1</button><button aria-current="page">2</button><button>3</button>
               </div>"#,
        );
        let hints = locate(&doc);

        assert_eq!(
            hints,
            PageHints {
                total_count: Some(1234),
                current_page: Some(2),
                total_pages: None,
                page_size: Some(10),
            }
        );
    }

    #[test]
    fn test_last_page_range_keeps_page_size_unknown() {
        let doc = Html::parse_document(
            r#"<nav aria-label="pages"><span>21 – 23 من 23</span><span>Page 3</span></nav>"#,
        );
        let hints = locate(&doc);

        assert_eq!(hints.total_count, Some(23));
        assert_eq!(hints.page_size, None);
        assert_eq!(hints.current_page, Some(3));
    }

    #[test]
    fn test_hidden_results_element_is_ignored() {
        let doc = Html::parse_document(
            r#"<span class="results-count" hidden>999</span><p>Results: 7</p>"#,
        );
        assert_eq!(locate(&doc).total_count, Some(7));
    }
}
