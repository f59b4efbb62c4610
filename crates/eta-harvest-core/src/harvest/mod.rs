//! The harvest loop: drive the pager, acquire each page, accumulate records,
//! report progress, and stop when there is nothing left or no way forward.

mod accumulator;
mod progress;
mod session;

pub use accumulator::Accumulator;
pub use progress::{NoProgress, ProgressSink, ProgressUpdate};
pub use session::HarvestSession;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scraper::Html;
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dom::{has_rendered_rows, PageDriver};
use crate::error::{DriverError, HarvestError, Result};
use crate::models::{HarvestConfig, InvoiceRecord};
use crate::network::{recognize, NetworkObserver};
use crate::pagination::{Advance, Exhaustion};
use crate::reconcile::SourceReconciler;

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// Upper bound on pages visited; the configured maximum when unset.
    pub max_pages: Option<u32>,
    /// Checked between pages; a cancelled run returns what it collected.
    pub cancel: CancellationToken,
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum Termination {
    /// As many records as the known total count.
    TotalReached,
    /// The last page was processed.
    LastPage,
    /// Too many consecutive pages without records.
    EmptyPages,
    /// Navigating kept showing the same page.
    Stuck,
    /// No usable control to reach the next page.
    NoNextControl,
    Cancelled,
    /// The page cap was reached.
    PageLimit,
    /// The render target failed; records collected so far are kept.
    Fault(String),
}

impl Termination {
    pub fn is_fault(&self) -> bool {
        matches!(self, Termination::Fault(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::TotalReached => write!(f, "all records collected"),
            Termination::LastPage => write!(f, "last page reached"),
            Termination::EmptyPages => write!(f, "consecutive empty pages"),
            Termination::Stuck => write!(f, "pagination is not advancing"),
            Termination::NoNextControl => write!(f, "no next-page control"),
            Termination::Cancelled => write!(f, "cancelled"),
            Termination::PageLimit => write!(f, "page limit reached"),
            Termination::Fault(msg) => write!(f, "{msg}"),
        }
    }
}

/// Outcome of a run. Early termination still carries everything collected.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestReport {
    pub records: Vec<InvoiceRecord>,
    pub total_processed: usize,
    pub expected_total: Option<u64>,
    pub pages_visited: u32,
    pub termination: Termination,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates harvest runs against one render target.
pub struct Harvester {
    driver: Arc<dyn PageDriver>,
    observer: Arc<dyn NetworkObserver>,
    config: HarvestConfig,
    reconciler: SourceReconciler,
    running: AtomicBool,
}

impl Harvester {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        observer: Arc<dyn NetworkObserver>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            driver,
            observer,
            reconciler: SourceReconciler::from_config(&config),
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    pub fn observer(&self) -> &dyn NetworkObserver {
        self.observer.as_ref()
    }

    pub fn reconciler(&self) -> &SourceReconciler {
        &self.reconciler
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Walk every page from the first and return the deduplicated records.
    ///
    /// Fails only with [`HarvestError::AlreadyRunning`]; every other problem
    /// ends the run early and is described by the report's termination.
    pub async fn harvest_all(
        &self,
        options: HarvestOptions,
        progress: &dyn ProgressSink,
    ) -> Result<HarvestReport> {
        let _guard = RunGuard::acquire(&self.running).ok_or(HarvestError::AlreadyRunning)?;
        let started = Instant::now();
        let mut session = HarvestSession::new(&self.config, self.observer.as_ref());

        info!("Starting harvest");
        let termination = self.run(&mut session, &options, progress).await;

        let state = session.pager.state();
        let expected_total = state.total_count();
        let collected = session.accumulator.len();
        let finished = ProgressUpdate::new(state.current_page(), state.total_pages(), collected, expected_total)
            .with_message(format!("Finished: {collected} invoices ({termination})"));
        progress.report(&finished);

        if termination.is_fault() {
            warn!(%termination, collected, "Harvest stopped by a fault");
        } else {
            info!(
                %termination,
                collected,
                pages = session.pages_visited,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Harvest finished"
            );
        }

        let records = session.accumulator.into_records();
        Ok(HarvestReport {
            total_processed: records.len(),
            records,
            expected_total,
            pages_visited: session.pages_visited,
            termination,
        })
    }

    async fn run(
        &self,
        session: &mut HarvestSession,
        options: &HarvestOptions,
        progress: &dyn ProgressSink,
    ) -> Termination {
        let driver = self.driver.as_ref();
        let max_pages = options
            .max_pages
            .unwrap_or(self.config.pagination.max_pages)
            .max(1);
        let max_empty = self.config.pagination.max_empty_pages.max(1);

        if let Err(e) = session.pager.navigate_first(driver).await {
            return Termination::Fault(e.to_string());
        }

        for cycle in 0..max_pages {
            if options.cancel.is_cancelled() {
                info!(cycle, "Harvest cancelled");
                return Termination::Cancelled;
            }

            let html = match self.wait_for_render(session, cycle == 0).await {
                Ok(html) => html,
                Err(e) => return Termination::Fault(e.to_string()),
            };
            let snapshot = {
                let doc = Html::parse_document(&html);
                self.reconciler
                    .acquire_page(&mut session.network, &mut session.pager, &doc)
            };

            session.pages_visited += 1;
            let added = session.accumulator.merge(&snapshot.records);
            if snapshot.is_empty() {
                session.empty_streak += 1;
            } else {
                session.empty_streak = 0;
            }
            let stuck = session.pager.observe(&snapshot.signature());

            let state = session.pager.state();
            debug!(
                page = snapshot.page_index,
                source = ?snapshot.source,
                records = snapshot.records.len(),
                added,
                collected = session.accumulator.len(),
                "Page processed"
            );
            progress.report(&ProgressUpdate::new(
                state.current_page(),
                state.total_pages(),
                session.accumulator.len(),
                state.total_count(),
            ));

            match session.pager.exhaustion(session.accumulator.len()) {
                Some(Exhaustion::TotalReached) => return Termination::TotalReached,
                Some(Exhaustion::LastPage) => return Termination::LastPage,
                None => {}
            }
            if session.empty_streak >= max_empty {
                return Termination::EmptyPages;
            }
            if stuck {
                return Termination::Stuck;
            }
            if cycle + 1 >= max_pages {
                break;
            }

            match session.pager.navigate_next(driver).await {
                Ok(Advance::Clicked(_)) => {}
                Ok(Advance::NoControl) => return Termination::NoNextControl,
                Err(e) => return Termination::Fault(e.to_string()),
            }
            sleep(self.config.timing.pacing()).await;
        }

        Termination::PageLimit
    }

    /// Poll until the listing has rendered (rows in the document or a fresh
    /// listing response), then let it settle. On timeout the page is used
    /// as it is.
    async fn wait_for_render(
        &self,
        session: &mut HarvestSession,
        first_page: bool,
    ) -> std::result::Result<String, DriverError> {
        let timing = &self.config.timing;
        let deadline = Instant::now() + timing.ready_timeout(first_page);

        loop {
            let html = self.driver.content().await?;
            let rows = {
                let doc = Html::parse_document(&html);
                has_rendered_rows(&doc)
            };
            let not_before = session.pager.last_navigation();
            let listing = session
                .network
                .drain()
                .fresh(Instant::now(), not_before)
                .any(|e| recognize(&e.payload).is_some());

            if rows || listing {
                sleep(timing.stabilize()).await;
                return self.driver.content().await;
            }
            if Instant::now() >= deadline {
                debug!(first_page, "Listing not rendered in time, scanning anyway");
                return Ok(html);
            }
            sleep(timing.poll_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkTap;
    use crate::replay::{ReplayDriver, ReplayPage};
    use crate::testing::{listing_json, listing_page, paged_listing, uuid, RecordingSink, LISTING_URL};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn harvester(driver: Arc<ReplayDriver>, tap: Arc<NetworkTap>) -> Harvester {
        Harvester::new(driver, tap, HarvestConfig::default())
    }

    fn tap() -> Arc<NetworkTap> {
        Arc::new(NetworkTap::from_config(&HarvestConfig::default()))
    }

    fn three_pages() -> Vec<ReplayPage> {
        vec![
            ReplayPage::html(paged_listing(1..=10, 23, 1, false)),
            ReplayPage::html(paged_listing(11..=20, 23, 2, false)),
            ReplayPage::html(paged_listing(21..=23, 23, 3, true)),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_count_drives_page_count() {
        let driver = Arc::new(ReplayDriver::new(three_pages()));
        let harvester = harvester(driver.clone(), tap());
        let sink = RecordingSink::default();

        let report = harvester
            .harvest_all(HarvestOptions::default(), &sink)
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::TotalReached);
        assert_eq!(report.total_processed, 23);
        assert_eq!(report.expected_total, Some(23));
        assert_eq!(report.pages_visited, 3);
        assert_eq!(driver.clicks(), 2);
        assert_eq!(report.records[22].serial_number, "23");
        assert_eq!(report.records[22].electronic_number, uuid(23));

        let updates = sink.updates();
        assert!(updates.len() >= 3);
        assert_eq!(updates[0].total_pages, 3);
        assert_eq!(updates.last().unwrap().percentage, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rendered_total_reached_on_first_page() {
        let driver = Arc::new(ReplayDriver::new(vec![
            ReplayPage::html(paged_listing(1..=12, 12, 1, false)),
            ReplayPage::html(paged_listing(13..=14, 14, 2, true)),
        ]));
        let harvester = harvester(driver.clone(), tap());

        let report = harvester
            .harvest_all(HarvestOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::TotalReached);
        assert_eq!(report.total_processed, 12);
        assert_eq!(report.pages_visited, 1);
        assert_eq!(driver.clicks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_page_number_in_listing() {
        let tap = tap();
        let page = format!(
            "{}<div class=\"pagination\"><button class=\"next-page\">Next</button></div>",
            listing_page(1..=3, None)
        );
        let payload = json!({
            "result": [{"uuid": uuid(1), "total": 114}],
            "currentPage": u64::from(u32::MAX),
        });
        let driver = Arc::new(
            ReplayDriver::new(vec![ReplayPage::html(page).with_capture(LISTING_URL, payload.to_string())])
                .with_tap(tap.clone()),
        );
        let harvester = harvester(driver.clone(), tap);

        let report = harvester
            .harvest_all(HarvestOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert!(!report.termination.is_fault());
        assert_eq!(report.total_processed, 3);
        assert!(driver.clicks() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_total_beats_rendered_total() {
        let tap = tap();
        let driver = Arc::new(
            ReplayDriver::new(vec![ReplayPage::html(listing_page(1..=10, Some(10)))
                .with_capture(LISTING_URL, listing_json(1..=10, 50))])
            .with_tap(tap.clone()),
        );
        let harvester = harvester(driver, tap);

        let report = harvester
            .harvest_all(HarvestOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.expected_total, Some(50));
        assert_eq!(report.total_processed, 10);
        assert_eq!(report.termination, Termination::NoNextControl);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_pages_stop_the_run() {
        let driver = Arc::new(ReplayDriver::new(vec![ReplayPage::html(paged_listing(
            1..=10,
            100,
            1,
            false,
        ))]));
        let harvester = harvester(driver.clone(), tap());

        let report = harvester
            .harvest_all(HarvestOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Stuck);
        assert_eq!(report.total_processed, 10);
        assert_eq!(report.pages_visited, 4);
        assert_eq!(driver.clicks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_never_advancing_pager_terminates() {
        let driver = Arc::new(ReplayDriver::new(vec![ReplayPage::html(
            r#"<p>No documents found</p><div class="pagination"><button class="next-page">Next</button></div>"#,
        )]));
        let harvester = harvester(driver, tap());

        let report = harvester
            .harvest_all(HarvestOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::EmptyPages);
        assert_eq!(report.pages_visited, 3);
        assert!(report.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_pages_are_deduplicated() {
        let driver = Arc::new(ReplayDriver::new(vec![
            ReplayPage::html(paged_listing(1..=10, 20, 1, false)),
            ReplayPage::html(paged_listing(8..=17, 20, 2, true)),
        ]));
        let harvester = harvester(driver, tap());

        let report = harvester
            .harvest_all(HarvestOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.total_processed, 17);
        let serials: Vec<String> = report.records.iter().map(|r| r.serial_number.clone()).collect();
        let expected: Vec<String> = (1..=17).map(|n| n.to_string()).collect();
        assert_eq!(serials, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_limit() {
        let driver = Arc::new(ReplayDriver::new(three_pages()));
        let harvester = harvester(driver.clone(), tap());
        let options = HarvestOptions {
            max_pages: Some(2),
            ..HarvestOptions::default()
        };

        let report = harvester.harvest_all(options, &NoProgress).await.unwrap();

        assert_eq!(report.termination, Termination::PageLimit);
        assert_eq!(report.total_processed, 20);
        assert_eq!(driver.clicks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_pages() {
        let driver = Arc::new(ReplayDriver::new(three_pages()));
        let harvester = harvester(driver, tap());
        let options = HarvestOptions::default();
        let cancel = options.cancel.clone();
        let sink = move |_: &ProgressUpdate| cancel.cancel();

        let report = harvester.harvest_all(options, &sink).await.unwrap();

        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.total_processed, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_fault_keeps_partial_records() {
        let driver = Arc::new(ReplayDriver::new(three_pages()).failing_at(1));
        let harvester = harvester(driver, tap());

        let report = harvester
            .harvest_all(HarvestOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert!(report.termination.is_fault());
        assert_eq!(report.total_processed, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight() {
        let driver = Arc::new(ReplayDriver::new(three_pages()));
        let harvester = harvester(driver, tap());

        let (first, second) = tokio::join!(
            harvester.harvest_all(HarvestOptions::default(), &NoProgress),
            harvester.harvest_all(HarvestOptions::default(), &NoProgress),
        );

        assert_eq!(first.unwrap().total_processed, 23);
        assert!(matches!(second, Err(HarvestError::AlreadyRunning)));
        assert!(!harvester.is_running());
    }
}
