//! A render target replaying recorded page snapshots.
//!
//! Each [`ReplayPage`] is the serialized document of one listing page plus
//! the listing responses the portal sent while rendering it. Clicking a
//! pager control moves between pages the way the live pager would.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use crate::dom::{element_text, ElementTarget, PageDriver};
use crate::error::DriverError;
use crate::invoice::rules::normalize_digits;
use crate::network::NetworkTap;

const FIRST_TOKENS: &[&str] = &["first", "«", "الأولى", "الاولى"];

/// A response recorded alongside a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayCapture {
    pub url: String,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayPage {
    pub html: String,
    pub captures: Vec<ReplayCapture>,
}

impl ReplayPage {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            captures: Vec::new(),
        }
    }

    pub fn with_capture(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.captures.push(ReplayCapture {
            url: url.into(),
            body: body.into(),
        });
        self
    }
}

#[derive(Debug)]
struct Cursor {
    position: usize,
    clicks: usize,
    announced: bool,
}

/// Replays pages in order. Captures of a page are published through the tap
/// the first time the page is read after arriving on it.
#[derive(Debug)]
pub struct ReplayDriver {
    pages: Vec<ReplayPage>,
    tap: Option<Arc<NetworkTap>>,
    fail_at: Option<usize>,
    cursor: Mutex<Cursor>,
}

impl ReplayDriver {
    pub fn new(pages: Vec<ReplayPage>) -> Self {
        Self {
            pages,
            tap: None,
            fail_at: None,
            cursor: Mutex::new(Cursor {
                position: 0,
                clicks: 0,
                announced: false,
            }),
        }
    }

    /// Publish recorded captures through `tap`.
    pub fn with_tap(mut self, tap: Arc<NetworkTap>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Simulate a lost render target once page `position` is reached.
    pub fn failing_at(mut self, position: usize) -> Self {
        self.fail_at = Some(position);
        self
    }

    pub fn position(&self) -> usize {
        self.cursor().position
    }

    pub fn clicks(&self) -> usize {
        self.cursor().clicks
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn cursor(&self) -> std::sync::MutexGuard<'_, Cursor> {
        self.cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Page a click leads to: a numbered control goes to that page, a
    /// "first" control to page 1, anything else one page on.
    fn destination(&self, position: usize, text: &str, labels: &[String]) -> usize {
        let last = self.pages.len().saturating_sub(1);

        if let Ok(number) = normalize_digits(text.trim()).parse::<usize>() {
            return number.saturating_sub(1).min(last);
        }
        let is_first = std::iter::once(text)
            .chain(labels.iter().map(String::as_str))
            .map(str::to_lowercase)
            .any(|l| FIRST_TOKENS.iter().any(|t| l.contains(t)));
        if is_first {
            return 0;
        }
        (position + 1).min(last)
    }
}

#[async_trait]
impl PageDriver for ReplayDriver {
    async fn content(&self) -> Result<String, DriverError> {
        let mut cursor = self.cursor();
        if self.fail_at == Some(cursor.position) {
            return Err(DriverError::Disconnected);
        }
        let page = self
            .pages
            .get(cursor.position)
            .ok_or_else(|| DriverError::Snapshot(format!("no page at {}", cursor.position)))?;

        if !cursor.announced {
            cursor.announced = true;
            if let Some(tap) = &self.tap {
                for capture in &page.captures {
                    tap.publish(&capture.url, &capture.body);
                }
            }
        }
        Ok(page.html.clone())
    }

    async fn click(&self, target: &ElementTarget) -> Result<(), DriverError> {
        let mut cursor = self.cursor();
        let page = self
            .pages
            .get(cursor.position)
            .ok_or(DriverError::Disconnected)?;

        let (text, labels) = {
            let doc = Html::parse_document(&page.html);
            let selector = Selector::parse(&target.selector)
                .map_err(|e| DriverError::Click(format!("invalid selector {}: {e}", target.selector)))?;
            let element = doc.select(&selector).nth(target.index).ok_or_else(|| {
                DriverError::ElementNotFound {
                    selector: target.selector.clone(),
                    index: target.index,
                }
            })?;
            let value = element.value();
            let labels: Vec<String> = [value.attr("aria-label"), value.attr("title")]
                .into_iter()
                .flatten()
                .chain(value.classes())
                .map(str::to_string)
                .collect();
            (element_text(element), labels)
        };

        let next = self.destination(cursor.position, &text, &labels);
        debug!(from = cursor.position, to = next, "Replay click");
        cursor.clicks += 1;
        if next != cursor.position {
            cursor.position = next;
            cursor.announced = false;
        }
        Ok(())
    }
}
