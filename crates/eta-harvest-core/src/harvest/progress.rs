//! Progress reporting to an external observer.

use serde::{Deserialize, Serialize};

/// One progress notification, emitted at least once per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub current_page: u32,
    /// Zero while unknown.
    pub total_pages: u32,
    /// 0..=100.
    pub percentage: u8,
    pub message: String,
}

impl ProgressUpdate {
    /// Progress after `collected` records on `current_page`.
    ///
    /// Measured against the expected total when one is known, else against
    /// the page count.
    pub fn new(
        current_page: u32,
        total_pages: Option<u32>,
        collected: usize,
        expected_total: Option<u64>,
    ) -> Self {
        let percentage = match (expected_total, total_pages) {
            (Some(total), _) if total > 0 => (collected as u64 * 100 / total).min(100),
            (_, Some(pages)) if pages > 0 => (u64::from(current_page) * 100 / u64::from(pages)).min(100),
            _ => 0,
        };

        let message = match total_pages {
            Some(pages) => format!("Page {current_page} of {pages}: {collected} invoices collected"),
            None => format!("Page {current_page}: {collected} invoices collected"),
        };

        Self {
            current_page,
            total_pages: total_pages.unwrap_or(0),
            percentage: percentage as u8,
            message,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Receives progress updates. Must not block the harvest for long.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

/// Discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: &ProgressUpdate) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: &ProgressUpdate) {
        self(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percentage_prefers_expected_total() {
        let update = ProgressUpdate::new(2, Some(3), 20, Some(23));
        assert_eq!(update.percentage, 86);
        assert_eq!(update.message, "Page 2 of 3: 20 invoices collected");

        let update = ProgressUpdate::new(2, Some(4), 20, None);
        assert_eq!(update.percentage, 50);

        let update = ProgressUpdate::new(5, None, 50, None);
        assert_eq!(update.percentage, 0);
        assert_eq!(update.total_pages, 0);
    }

    #[test]
    fn test_serialized_shape() {
        let update = ProgressUpdate::new(1, Some(3), 10, Some(23));
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["percentage"], 43);
    }

    #[test]
    fn test_closure_sink() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |u: &ProgressUpdate| seen.lock().unwrap().push(u.current_page);
        sink.report(&ProgressUpdate::new(1, None, 0, None));
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}
