//! Pagination facts with provenance.

use serde::Serialize;

use crate::models::PageHints;

/// Where a pagination value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Read from rendered text or controls.
    Heuristic,
    /// Advertised by the portal's API.
    Authoritative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Known<T> {
    value: T,
    provenance: Provenance,
}

/// What is known about the listing's pagination during one run.
///
/// Heuristic updates never override an authoritative value and never lower
/// a positive total count; authoritative updates override unconditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    current_page: Option<Known<u32>>,
    total_pages: Option<Known<u32>>,
    total_count: Option<Known<u64>>,
    page_size: Option<Known<u32>>,
    default_page_size: u32,
    max_pages: u32,
}

impl PaginationState {
    pub fn new(default_page_size: u32, max_pages: u32) -> Self {
        Self {
            current_page: None,
            total_pages: None,
            total_count: None,
            page_size: None,
            default_page_size: default_page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    /// Merge observed hints.
    pub fn apply(&mut self, hints: &PageHints, provenance: Provenance) {
        update(&mut self.current_page, hints.current_page, provenance);
        update(&mut self.page_size, hints.page_size.filter(|s| *s > 0), provenance);
        update(&mut self.total_pages, hints.total_pages, provenance);

        let total_count = match (provenance, self.total_count, hints.total_count) {
            (Provenance::Heuristic, Some(known), Some(seen)) if known.value > 0 && seen < known.value => None,
            _ => hints.total_count,
        };
        update(&mut self.total_count, total_count, provenance);
    }

    /// Record a successful advance when the next page has not said where it is.
    pub fn advance(&mut self) {
        let next = self.current_page().saturating_add(1);
        self.current_page = Some(Known {
            value: next,
            provenance: Provenance::Heuristic,
        });
    }

    pub fn reset_to_first(&mut self) {
        self.current_page = Some(Known {
            value: 1,
            provenance: Provenance::Heuristic,
        });
    }

    /// Current page, 1-based; page 1 until something says otherwise.
    pub fn current_page(&self) -> u32 {
        self.current_page.map_or(1, |k| k.value)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.map_or(self.default_page_size, |k| k.value)
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count.map(|k| k.value)
    }

    /// Total count, only when the portal's API advertised it.
    pub fn authoritative_total(&self) -> Option<u64> {
        self.total_count
            .filter(|k| k.provenance == Provenance::Authoritative)
            .map(|k| k.value)
    }

    pub fn total_count_provenance(&self) -> Option<Provenance> {
        self.total_count.map(|k| k.provenance)
    }

    /// Total pages: as stated, else derived from the total count and page
    /// size. Capped at the configured maximum.
    pub fn total_pages(&self) -> Option<u32> {
        let stated = self.total_pages.map(|k| k.value);
        let derived = self.total_count.map(|k| {
            let pages = k.value.div_ceil(u64::from(self.page_size()));
            u32::try_from(pages).unwrap_or(u32::MAX)
        });

        let pages = match (self.total_pages, self.total_count) {
            (Some(stated_known), Some(count_known))
                if count_known.provenance == Provenance::Authoritative
                    && stated_known.provenance == Provenance::Heuristic =>
            {
                derived
            }
            _ => stated.or(derived),
        };
        pages.map(|p| p.min(self.max_pages))
    }

    /// Current facts as hints.
    pub fn hints(&self) -> PageHints {
        PageHints {
            total_count: self.total_count(),
            current_page: Some(self.current_page()),
            total_pages: self.total_pages(),
            page_size: Some(self.page_size()),
        }
    }
}

fn update<T: Copy>(slot: &mut Option<Known<T>>, seen: Option<T>, provenance: Provenance) {
    let Some(value) = seen else {
        return;
    };
    let locked = matches!(
        (provenance, &*slot),
        (Provenance::Heuristic, Some(Known { provenance: Provenance::Authoritative, .. }))
    );
    if !locked {
        *slot = Some(Known { value, provenance });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(total_count: Option<u64>, page_size: Option<u32>) -> PageHints {
        PageHints {
            total_count,
            page_size,
            ..PageHints::default()
        }
    }

    #[test]
    fn test_derived_total_pages() {
        let mut state = PaginationState::new(10, 100);
        state.apply(&hints(Some(23), None), Provenance::Heuristic);

        assert_eq!(state.total_pages(), Some(3));
        assert_eq!(state.authoritative_total(), None);
    }

    #[test]
    fn test_authoritative_total_wins() {
        let mut state = PaginationState::new(10, 100);
        state.apply(&hints(Some(50), None), Provenance::Authoritative);
        state.apply(&hints(Some(10), None), Provenance::Heuristic);

        assert_eq!(state.total_count(), Some(50));
        assert_eq!(state.authoritative_total(), Some(50));
        assert_eq!(state.total_pages(), Some(5));
    }

    #[test]
    fn test_heuristic_never_lowers_total() {
        let mut state = PaginationState::new(10, 100);
        state.apply(&hints(Some(23), None), Provenance::Heuristic);
        state.apply(&hints(Some(3), None), Provenance::Heuristic);
        assert_eq!(state.total_count(), Some(23));

        state.apply(&hints(Some(30), None), Provenance::Heuristic);
        assert_eq!(state.total_count(), Some(30));

        state.apply(&hints(Some(12), None), Provenance::Authoritative);
        assert_eq!(state.total_count(), Some(12));
    }

    #[test]
    fn test_total_pages_capped() {
        let mut state = PaginationState::new(10, 100);
        state.apply(&hints(Some(5_000), None), Provenance::Heuristic);
        assert_eq!(state.total_pages(), Some(100));
    }

    #[test]
    fn test_advance() {
        let mut state = PaginationState::new(10, 100);
        assert_eq!(state.current_page(), 1);
        state.advance();
        state.advance();
        assert_eq!(state.current_page(), 3);

        state.apply(
            &PageHints {
                current_page: Some(2),
                ..PageHints::default()
            },
            Provenance::Heuristic,
        );
        assert_eq!(state.current_page(), 2);
    }

    #[test]
    fn test_advance_at_largest_page_saturates() {
        let mut state = PaginationState::new(10, 100);
        state.apply(
            &PageHints {
                current_page: Some(u32::MAX),
                ..PageHints::default()
            },
            Provenance::Authoritative,
        );

        state.advance();
        assert_eq!(state.current_page(), u32::MAX);
    }
}
