//! Recognition of listing payloads and their advertised pagination.

use serde_json::{Map, Value};

use crate::invoice::rules::IDENTIFIER_EXACT;
use crate::models::PageHints;

/// Properties that hold the listed documents.
const LIST_KEYS: &[&str] = &["result", "data", "documents", "items", "content", "records"];

/// Properties whose presence marks an item as a document.
const ID_KEYS: &[&str] = &["uuid", "electronicNumber", "documentId", "internalId", "submissionUuid"];

const TOTAL_COUNT_KEYS: &[&str] = &["totalCount", "totalElements", "total", "count"];
const TOTAL_PAGES_KEYS: &[&str] = &["totalPages", "pageCount"];
const CURRENT_PAGE_KEYS: &[&str] = &["currentPage", "page", "pageNumber"];
const PAGE_SIZE_KEYS: &[&str] = &["pageSize", "size", "limit"];

/// Sub-objects that may carry the pagination properties.
const PAGINATION_OBJECTS: &[&str] = &["metadata", "pagination"];

/// A payload recognized as a document listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<'a> {
    pub items: &'a [Value],
    pub hints: PageHints,
}

/// Recognize a listing: a known list property (directly or one object
/// deeper, as in `{"data": {"items": [...]}}`) or a top-level array of
/// document-shaped objects.
pub fn recognize(payload: &Value) -> Option<Listing<'_>> {
    match payload {
        Value::Array(items) => {
            let first = items.first()?.as_object()?;
            is_document(first).then(|| Listing {
                items: items.as_slice(),
                hints: PageHints::default(),
            })
        }
        Value::Object(object) => {
            let (items, holder) = list_in(object).or_else(|| {
                LIST_KEYS.iter().find_map(|k| {
                    let inner = object.get(*k)?.as_object()?;
                    list_in(inner)
                })
            })?;

            let mut hints = pagination_hints(object);
            if !std::ptr::eq(holder, object) {
                let inner = pagination_hints(holder);
                hints = merge(hints, inner);
            }
            Some(Listing {
                items,
                hints: plausible(hints),
            })
        }
        _ => None,
    }
}

fn list_in(object: &Map<String, Value>) -> Option<(&[Value], &Map<String, Value>)> {
    LIST_KEYS.iter().find_map(|k| {
        let items = object.get(*k)?.as_array()?;
        let listed = items.first().is_none_or(|i| i.as_object().is_some_and(is_document));
        listed.then_some((items.as_slice(), object))
    })
}

fn is_document(item: &Map<String, Value>) -> bool {
    ID_KEYS.iter().any(|k| item.contains_key(*k))
        || item
            .values()
            .filter_map(Value::as_str)
            .any(|s| IDENTIFIER_EXACT.is_match(s))
}

fn pagination_hints(object: &Map<String, Value>) -> PageHints {
    let mut hints = read_hints(object);
    for key in PAGINATION_OBJECTS {
        if let Some(inner) = object.get(*key).and_then(Value::as_object) {
            hints = merge(hints, read_hints(inner));
        }
    }
    hints
}

fn read_hints(object: &Map<String, Value>) -> PageHints {
    PageHints {
        total_count: first_number(object, TOTAL_COUNT_KEYS),
        total_pages: first_number(object, TOTAL_PAGES_KEYS).and_then(|n| u32::try_from(n).ok()),
        current_page: first_number(object, CURRENT_PAGE_KEYS).and_then(|n| u32::try_from(n).ok()),
        page_size: first_number(object, PAGE_SIZE_KEYS).and_then(|n| u32::try_from(n).ok()),
    }
}

fn first_number(object: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| match object.get(*k)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Drop a current page that cannot be right: zero, or past the stated last page.
fn plausible(mut hints: PageHints) -> PageHints {
    hints.current_page = hints
        .current_page
        .filter(|page| *page > 0 && hints.total_pages.is_none_or(|total| *page <= total));
    hints
}

/// Values already present win over later ones.
fn merge(base: PageHints, more: PageHints) -> PageHints {
    PageHints {
        total_count: base.total_count.or(more.total_count),
        current_page: base.current_page.or(more.current_page),
        total_pages: base.total_pages.or(more.total_pages),
        page_size: base.page_size.or(more.page_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_recognize_eta_recent_documents() {
        let payload = json!({
            "result": [{"uuid": "7NBY3R0PQ9XG1W5JZ2KDV6M8TA", "total": 114}],
            "metadata": {"totalPages": 5, "totalCount": 50}
        });

        let listing = recognize(&payload).unwrap();

        assert_eq!(listing.items.len(), 1);
        assert_eq!(
            listing.hints,
            PageHints {
                total_count: Some(50),
                current_page: None,
                total_pages: Some(5),
                page_size: None,
            }
        );
    }

    #[test]
    fn test_recognize_nested_list_and_string_numbers() {
        let payload = json!({
            "data": {
                "items": [{"documentId": "A1"}],
                "pagination": {"page": "2", "pageSize": "10", "totalElements": "23"}
            }
        });

        let listing = recognize(&payload).unwrap();

        assert_eq!(listing.hints.current_page, Some(2));
        assert_eq!(listing.hints.page_size, Some(10));
        assert_eq!(listing.hints.total_count, Some(23));
    }

    #[test]
    fn test_implausible_current_page_is_dropped() {
        let past_end = json!({
            "result": [{"uuid": "7NBY3R0PQ9XG1W5JZ2KDV6M8TA"}],
            "metadata": {"currentPage": 9, "totalPages": 5}
        });
        let zero = json!({"result": [{"uuid": "7NBY3R0PQ9XG1W5JZ2KDV6M8TA"}], "currentPage": 0});
        let in_range = json!({
            "result": [{"uuid": "7NBY3R0PQ9XG1W5JZ2KDV6M8TA"}],
            "currentPage": 5,
            "totalPages": 5
        });

        assert_eq!(recognize(&past_end).unwrap().hints.current_page, None);
        assert_eq!(recognize(&past_end).unwrap().hints.total_pages, Some(5));
        assert_eq!(recognize(&zero).unwrap().hints.current_page, None);
        assert_eq!(recognize(&in_range).unwrap().hints.current_page, Some(5));
    }

    #[test]
    fn test_recognize_top_level_array() {
        let listed = json!([{"id": 1, "ref": "7NBY3R0PQ9XG1W5JZ2KDV6M8TA"}]);
        let other = json!([{"id": 1, "name": "x"}]);

        assert!(recognize(&listed).is_some());
        assert!(recognize(&other).is_none());
    }

    #[test]
    fn test_empty_listing_is_still_a_listing() {
        let payload = json!({"result": [], "metadata": {"totalCount": 0}});
        let listing = recognize(&payload).unwrap();
        assert!(listing.items.is_empty());
        assert_eq!(listing.hints.total_count, Some(0));
    }

    #[test]
    fn test_unrelated_payloads() {
        assert!(recognize(&json!({"user": {"name": "x"}})).is_none());
        assert!(recognize(&json!({"data": [{"label": "menu"}]})).is_none());
        assert!(recognize(&json!("ok")).is_none());
    }
}
