//! Building a page snapshot from whichever channel has the data.

use rayon::prelude::*;
use scraper::Html;
use tokio::time::Instant;
use tracing::debug;

use crate::dom::{scan_rows, ScanMemo};
use crate::invoice::{InvoiceExtractor, RecordExtractor, RecordSource};
use crate::models::{ExtractionSource, HarvestConfig, InvoiceRecord, PageSnapshot};
use crate::network::{recognize, NetworkSession};
use crate::pagination::PaginationController;

/// Chooses between an intercepted listing response and a structural scan
/// for each page, and records the pagination each one reveals.
#[derive(Debug, Clone)]
pub struct SourceReconciler {
    extractor: RecordExtractor,
}

impl SourceReconciler {
    pub fn new(extractor: RecordExtractor) -> Self {
        Self { extractor }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(RecordExtractor::from_config(config))
    }

    pub fn extractor(&self) -> &RecordExtractor {
        &self.extractor
    }

    /// Snapshot of the page currently shown.
    ///
    /// Structural pagination hints are always read and applied as heuristic.
    /// A fresh listing response captured since the last navigation supplies
    /// the records and authoritative pagination; otherwise the rendered rows
    /// are scanned.
    pub fn acquire_page(
        &self,
        network: &mut NetworkSession,
        pager: &mut PaginationController,
        doc: &Html,
    ) -> PageSnapshot {
        pager.locate(doc);

        let not_before = pager.last_navigation();
        let cache = network.drain();
        let listing = cache
            .fresh(Instant::now(), not_before)
            .find_map(|entry| recognize(&entry.payload).map(|l| (entry.url.as_str(), l)));

        if let Some((url, listing)) = listing {
            pager.apply_authoritative(&listing.hints);
            let records = self.extract_items(listing.items);

            if !records.is_empty() || listing.items.is_empty() {
                debug!(url, records = records.len(), "Page acquired from network");
                return PageSnapshot {
                    records,
                    page_index: pager.state().current_page(),
                    source: ExtractionSource::Network,
                    hints: pager.state().hints(),
                };
            }
            debug!(url, "Listing response had no usable records, scanning instead");
        }

        self.structural(pager, doc)
    }

    /// Snapshot from the rendered rows alone, ignoring captured responses.
    pub fn scan_page(&self, pager: &mut PaginationController, doc: &Html) -> PageSnapshot {
        pager.locate(doc);
        self.structural(pager, doc)
    }

    fn structural(&self, pager: &PaginationController, doc: &Html) -> PageSnapshot {
        let mut memo = ScanMemo::new();
        let records = match scan_rows(doc, &mut memo) {
            Some(scan) => finalize(scan.extract(&self.extractor)),
            None => Vec::new(),
        };
        debug!(records = records.len(), "Page acquired from document");

        PageSnapshot {
            records,
            page_index: pager.state().current_page(),
            source: ExtractionSource::Structural,
            hints: pager.state().hints(),
        }
    }

    fn extract_items(&self, items: &[serde_json::Value]) -> Vec<InvoiceRecord> {
        let records = items
            .par_iter()
            .enumerate()
            .map(|(index, item)| self.extractor.extract(RecordSource::Network { item, index }))
            .collect();
        finalize(records)
    }
}

/// Drop invalid records and number the rest in row order.
fn finalize(records: Vec<InvoiceRecord>) -> Vec<InvoiceRecord> {
    records
        .into_iter()
        .filter(InvoiceRecord::is_valid)
        .enumerate()
        .map(|(i, mut record)| {
            record.serial_number = (i + 1).to_string();
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkCache, NetworkTap};
    use crate::testing::{listing_json, listing_page, LISTING_URL};
    use pretty_assertions::assert_eq;

    fn setup() -> (NetworkTap, NetworkSession, PaginationController, SourceReconciler) {
        let config = HarvestConfig::default();
        let tap = NetworkTap::from_config(&config);
        let network = NetworkSession::new(&tap, NetworkCache::new(config.cache.freshness()));
        (
            tap,
            network,
            PaginationController::new(&config),
            SourceReconciler::from_config(&config),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_structural_when_nothing_captured() {
        let (_tap, mut network, mut pager, reconciler) = setup();
        let doc = Html::parse_document(&listing_page(1..=10, Some(23)));

        let snapshot = reconciler.acquire_page(&mut network, &mut pager, &doc);

        assert_eq!(snapshot.source, ExtractionSource::Structural);
        assert_eq!(snapshot.records.len(), 10);
        assert_eq!(snapshot.records[9].serial_number, "10");
        assert_eq!(snapshot.hints.total_count, Some(23));
        assert_eq!(snapshot.hints.total_pages, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_listing_is_preferred_and_authoritative() {
        let (tap, mut network, mut pager, reconciler) = setup();
        let doc = Html::parse_document(&listing_page(1..=10, Some(10)));
        tap.publish(LISTING_URL, &listing_json(101..=110, 50));

        let snapshot = reconciler.acquire_page(&mut network, &mut pager, &doc);

        assert_eq!(snapshot.source, ExtractionSource::Network);
        assert_eq!(snapshot.records.len(), 10);
        assert_eq!(snapshot.hints.total_count, Some(50));
        assert_eq!(pager.state().authoritative_total(), Some(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_capture_is_ignored() {
        let (tap, mut network, mut pager, reconciler) = setup();
        tap.publish(LISTING_URL, &listing_json(101..=110, 50));
        tokio::time::advance(std::time::Duration::from_secs(16)).await;
        let doc = Html::parse_document(&listing_page(1..=10, Some(23)));

        let snapshot = reconciler.acquire_page(&mut network, &mut pager, &doc);

        assert_eq!(snapshot.source, ExtractionSource::Structural);
        assert_eq!(pager.state().authoritative_total(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_page_bypasses_cache() {
        let (tap, mut network, mut pager, reconciler) = setup();
        tap.publish(LISTING_URL, &listing_json(101..=110, 50));
        network.drain();
        let doc = Html::parse_document(&listing_page(1..=3, None));

        let snapshot = reconciler.scan_page(&mut pager, &doc);

        assert_eq!(snapshot.source, ExtractionSource::Structural);
        assert_eq!(snapshot.records.len(), 3);
    }
}
