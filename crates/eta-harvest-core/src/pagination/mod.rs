//! Pagination controller: locating the listing's position, moving through
//! pages, and deciding when there is nothing left to visit.

mod controls;
mod locate;
mod state;

pub use controls::{find_first, find_next, ControlKind, PagerControl};
pub use locate::{locate, pager_regions, PAGER_REGIONS};
pub use state::{PaginationState, Provenance};

use std::time::Duration;

use scraper::Html;
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::dom::PageDriver;
use crate::error::DriverError;
use crate::models::{HarvestConfig, PageHints};

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PagerPhase {
    Unknown,
    Located,
    Navigating,
    Stuck,
    Exhausted,
}

/// Why there are no more pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// As many records as the known total count.
    TotalReached,
    /// The current page is the last one.
    LastPage,
}

/// Result of an attempt to move to the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Clicked(ControlKind),
    NoControl,
}

#[derive(Debug)]
pub struct PaginationController {
    phase: PagerPhase,
    state: PaginationState,
    settle: Duration,
    max_stuck: u32,
    last_signature: Option<String>,
    repeats: u32,
    last_navigation: Option<Instant>,
}

impl PaginationController {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            phase: PagerPhase::Unknown,
            state: PaginationState::new(
                config.pagination.default_page_size,
                config.pagination.max_pages,
            ),
            settle: config.timing.settle(),
            max_stuck: config.pagination.max_stuck_pages.max(1),
            last_signature: None,
            repeats: 0,
            last_navigation: None,
        }
    }

    pub fn phase(&self) -> PagerPhase {
        self.phase
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// When the last navigation click was dispatched.
    pub fn last_navigation(&self) -> Option<Instant> {
        self.last_navigation
    }

    /// Read position and totals from the document; applied as heuristic.
    pub fn locate(&mut self, doc: &Html) -> PageHints {
        let hints = locate(doc);
        self.state.apply(&hints, Provenance::Heuristic);
        if matches!(self.phase, PagerPhase::Unknown | PagerPhase::Navigating) {
            self.phase = PagerPhase::Located;
        }
        hints
    }

    /// Apply pagination advertised by the portal's API.
    pub fn apply_authoritative(&mut self, hints: &PageHints) {
        if !hints.is_empty() {
            self.state.apply(hints, Provenance::Authoritative);
        }
    }

    /// Compare the signature of the page just acquired with the previous one.
    ///
    /// Returns true once the pager has produced the same page
    /// `max_stuck` times in a row. Empty pages carry no signature and
    /// neither count nor reset the streak.
    pub fn observe(&mut self, signature: &str) -> bool {
        if signature.is_empty() {
            return self.phase == PagerPhase::Stuck;
        }

        match &self.last_signature {
            Some(previous) if previous == signature => self.repeats += 1,
            _ => self.repeats = 0,
        }
        self.last_signature = Some(signature.to_string());

        if self.repeats >= self.max_stuck {
            warn!(repeats = self.repeats, "Page did not change after navigating");
            self.phase = PagerPhase::Stuck;
        }
        self.phase == PagerPhase::Stuck
    }

    /// Whether the run has seen everything, given `accumulated` records.
    ///
    /// The total count is used whichever channel supplied it; an
    /// advertised total already takes precedence over one read from the page.
    pub fn exhaustion(&mut self, accumulated: usize) -> Option<Exhaustion> {
        let reason = if self
            .state
            .total_count()
            .is_some_and(|total| total > 0 && accumulated as u64 >= total)
        {
            Some(Exhaustion::TotalReached)
        } else if self
            .state
            .total_pages()
            .is_some_and(|pages| self.state.current_page() >= pages)
        {
            Some(Exhaustion::LastPage)
        } else {
            None
        };

        if reason.is_some() {
            self.phase = PagerPhase::Exhausted;
        }
        reason
    }

    /// Click the next-page control and wait for the page to settle.
    ///
    /// Whether the page actually changed is judged on the next scan.
    pub async fn navigate_next(&mut self, driver: &dyn PageDriver) -> Result<Advance, DriverError> {
        let html = driver.content().await?;
        let control = {
            let doc = Html::parse_document(&html);
            find_next(&doc, self.state.current_page())
        };

        let Some(control) = control else {
            info!(page = self.state.current_page(), "No usable next-page control");
            return Ok(Advance::NoControl);
        };

        debug!(
            selector = %control.target.selector,
            index = control.target.index,
            kind = ?control.kind,
            "Clicking next page"
        );
        self.phase = PagerPhase::Navigating;
        self.last_navigation = Some(Instant::now());
        driver.click(&control.target).await?;
        sleep(self.settle).await;
        self.state.advance();

        Ok(Advance::Clicked(control.kind))
    }

    /// Return to page 1 if the listing is elsewhere. A missing control is
    /// not an error; the run then starts where the listing is.
    pub async fn navigate_first(&mut self, driver: &dyn PageDriver) -> Result<bool, DriverError> {
        let html = driver.content().await?;
        let (current, control) = {
            let doc = Html::parse_document(&html);
            (locate(&doc).current_page, find_first(&doc))
        };

        if current.is_none_or(|page| page == 1) {
            self.state.reset_to_first();
            return Ok(false);
        }

        let Some(control) = control else {
            debug!(page = ?current, "No first-page control, starting where the listing is");
            return Ok(false);
        };

        debug!(selector = %control.target.selector, index = control.target.index, "Returning to first page");
        self.phase = PagerPhase::Navigating;
        self.last_navigation = Some(Instant::now());
        driver.click(&control.target).await?;
        sleep(self.settle).await;
        self.state.reset_to_first();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ReplayDriver, ReplayPage};

    fn controller() -> PaginationController {
        PaginationController::new(&HarvestConfig::default())
    }

    #[test]
    fn test_stuck_after_three_repeats() {
        let mut pager = controller();

        assert!(!pager.observe("A"));
        assert!(!pager.observe("A"));
        assert!(!pager.observe(""));
        assert!(!pager.observe("A"));
        assert!(pager.observe("A"));
        assert_eq!(pager.phase(), PagerPhase::Stuck);
    }

    #[test]
    fn test_changing_pages_reset_streak() {
        let mut pager = controller();
        for signature in ["A", "A", "B", "B", "C", "C"] {
            assert!(!pager.observe(signature));
        }
    }

    #[test]
    fn test_exhaustion_by_pages_and_total() {
        let mut pager = controller();
        let doc = Html::parse_document("<p>Results: 23</p>");
        pager.locate(&doc);
        assert_eq!(pager.exhaustion(10), None);

        pager.state.advance();
        pager.state.advance();
        assert_eq!(pager.exhaustion(20), Some(Exhaustion::LastPage));
        assert_eq!(pager.exhaustion(23), Some(Exhaustion::TotalReached));

        let mut pager = controller();
        pager.apply_authoritative(&PageHints {
            total_count: Some(15),
            ..PageHints::default()
        });
        assert_eq!(pager.exhaustion(15), Some(Exhaustion::TotalReached));
        assert_eq!(pager.phase(), PagerPhase::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_next_clicks_and_advances() {
        let driver = ReplayDriver::new(vec![
            ReplayPage::html(r#"<div class="pagination"><button class="next-page">Next</button></div>"#),
            ReplayPage::html("<p>second</p>"),
        ]);
        let mut pager = controller();

        let advance = pager.navigate_next(&driver).await.unwrap();

        assert_eq!(advance, Advance::Clicked(ControlKind::Structural));
        assert_eq!(driver.position(), 1);
        assert_eq!(pager.state().current_page(), 2);
        assert!(pager.last_navigation().is_some());

        let advance = pager.navigate_next(&driver).await.unwrap();
        assert_eq!(advance, Advance::NoControl);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_first_without_control_is_not_an_error() {
        let driver = ReplayDriver::new(vec![ReplayPage::html(
            r#"<div class="pagination"><span aria-current="page">4</span></div>"#,
        )]);
        let mut pager = controller();

        assert!(!pager.navigate_first(&driver).await.unwrap());
        assert_eq!(driver.clicks(), 0);
    }
}
