//! Request/response surface for an external controller.
//!
//! Requests are JSON objects tagged by `action`; every request gets exactly
//! one [`Response`]. Progress of a multi-page harvest goes to the
//! [`ProgressSink`] passed alongside the request.

use std::sync::{Arc, Mutex, MutexGuard};

use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dom::{scan_line_items, PageDriver};
use crate::error::{DriverError, HarvestError};
use crate::harvest::{HarvestOptions, Harvester, ProgressSink, Termination};
use crate::invoice::line_items_from_payload;
use crate::models::{ExtractionSource, HarvestConfig, InvoiceRecord, LineItemDetail, PageSnapshot};
use crate::network::{NetworkCache, NetworkObserver, NetworkSession};
use crate::pagination::PaginationController;

const ACTIONS: &[&str] = &[
    "ping",
    "getInvoiceData",
    "getAllPagesData",
    "getInvoiceDetails",
    "rescanPage",
];

/// A request from the controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    Ping,
    /// Records of the page currently shown.
    GetInvoiceData,
    /// Harvest every page.
    GetAllPagesData {
        #[serde(default)]
        options: Option<HarvestRequestOptions>,
    },
    /// Line items of one invoice, best effort.
    #[serde(rename_all = "camelCase")]
    GetInvoiceDetails { invoice_id: String },
    /// Re-scan the rendered rows of the current page, ignoring captured responses.
    RescanPage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarvestRequestOptions {
    pub max_pages: Option<u32>,
}

/// Records and pagination of a single page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub invoices: Vec<InvoiceRecord>,
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u32,
    pub source: ExtractionSource,
}

impl PageData {
    fn new(snapshot: PageSnapshot, pager: &PaginationController) -> Self {
        let state = pager.state();
        Self {
            total_count: state
                .total_count()
                .unwrap_or(snapshot.records.len() as u64),
            current_page: state.current_page(),
            total_pages: state.total_pages().unwrap_or(1),
            source: snapshot.source,
            invoices: snapshot.records,
        }
    }
}

/// Payload of a response.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Page(PageData),
    Records(Vec<InvoiceRecord>),
    Lines(Vec<LineItemDetail>),
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_visited: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
}

impl Response {
    fn ok(data: ResponseData) -> Self {
        Self {
            data: Some(data),
            ..Self::empty(true)
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(false)
        }
    }

    fn empty(success: bool) -> Self {
        Self {
            success,
            message: None,
            error: None,
            data: None,
            total_processed: None,
            expected_total: None,
            pages_visited: None,
            termination: None,
        }
    }
}

/// Serves requests against one render target.
///
/// Single-page requests share a standing network subscription so responses
/// captured between requests are still available to the next one.
pub struct Service {
    harvester: Harvester,
    probe: Mutex<NetworkSession>,
    cancel: CancellationToken,
}

impl Service {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        observer: Arc<dyn NetworkObserver>,
        config: HarvestConfig,
    ) -> Self {
        let probe = NetworkSession::new(
            observer.as_ref(),
            NetworkCache::new(config.cache.freshness()),
        );
        Self {
            harvester: Harvester::new(driver, observer, config),
            probe: Mutex::new(probe),
            cancel: CancellationToken::new(),
        }
    }

    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    /// Cancels the running harvest, and any started later.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Parse a JSON request and handle it.
    pub async fn handle_json(&self, request: &str, progress: &dyn ProgressSink) -> Response {
        let value: Value = match serde_json::from_str(request) {
            Ok(value) => value,
            Err(e) => return Response::failure(HarvestError::from(e).to_string()),
        };

        let known = value
            .get("action")
            .and_then(Value::as_str)
            .is_some_and(|action| ACTIONS.contains(&action));
        if !known {
            debug!(action = ?value.get("action"), "Unknown action");
            return Response::failure("Unknown action");
        }

        match serde_json::from_value::<Request>(value) {
            Ok(request) => self.handle(request, progress).await,
            Err(e) => Response::failure(HarvestError::from(e).to_string()),
        }
    }

    pub async fn handle(&self, request: Request, progress: &dyn ProgressSink) -> Response {
        debug!(?request, "Handling request");
        let result = match request {
            Request::Ping => Ok(Response {
                message: Some("Content script ready".to_string()),
                ..Response::empty(true)
            }),
            Request::GetInvoiceData => self.current_page(false).await,
            Request::RescanPage => self.current_page(true).await,
            Request::GetAllPagesData { options } => Ok(self.all_pages(options, progress).await),
            Request::GetInvoiceDetails { invoice_id } => self.details(&invoice_id).await,
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Request failed");
            Response::failure(e.to_string())
        })
    }

    async fn current_page(&self, rescan: bool) -> Result<Response, DriverError> {
        let html = self.harvester.driver().content().await?;
        let mut pager = PaginationController::new(self.harvester.config());
        let reconciler = self.harvester.reconciler();

        let snapshot = {
            let doc = Html::parse_document(&html);
            if rescan {
                reconciler.scan_page(&mut pager, &doc)
            } else {
                reconciler.acquire_page(&mut self.probe(), &mut pager, &doc)
            }
        };

        Ok(Response::ok(ResponseData::Page(PageData::new(snapshot, &pager))))
    }

    async fn all_pages(
        &self,
        options: Option<HarvestRequestOptions>,
        progress: &dyn ProgressSink,
    ) -> Response {
        let options = HarvestOptions {
            max_pages: options.and_then(|o| o.max_pages),
            cancel: self.cancel.child_token(),
        };

        // The run has its own subscription; keep the standing one from
        // piling up every capture the run triggers.
        self.probe().drain();
        let result = self.harvester.harvest_all(options, progress).await;
        self.probe().drain();

        let report = match result {
            Ok(report) => report,
            Err(e) => return Response::failure(e.to_string()),
        };

        if report.termination.is_fault() {
            return Response {
                error: Some(report.termination.to_string()),
                data: Some(ResponseData::Records(report.records)),
                ..Response::empty(false)
            };
        }

        info!(
            records = report.total_processed,
            termination = %report.termination,
            "Harvest request complete"
        );
        Response {
            data: Some(ResponseData::Records(report.records)),
            total_processed: Some(report.total_processed),
            expected_total: report.expected_total,
            pages_visited: Some(report.pages_visited),
            termination: Some(report.termination),
            ..Response::empty(true)
        }
    }

    /// Lines from a fresh captured payload for the document, else from a
    /// details table on the current page, else none.
    async fn details(&self, invoice_id: &str) -> Result<Response, DriverError> {
        let cached = {
            let mut probe = self.probe();
            probe
                .drain()
                .fresh(Instant::now(), None)
                .find_map(|entry| line_items_from_payload(&entry.payload, invoice_id))
        };
        if let Some(lines) = cached {
            debug!(invoice_id, lines = lines.len(), "Line items from captured response");
            return Ok(Response::ok(ResponseData::Lines(lines)));
        }

        let html = self.harvester.driver().content().await?;
        let lines = {
            let doc = Html::parse_document(&html);
            scan_line_items(&doc, invoice_id)
        };
        debug!(invoice_id, lines = lines.len(), "Line items from document");
        Ok(Response::ok(ResponseData::Lines(lines)))
    }

    fn probe(&self) -> MutexGuard<'_, NetworkSession> {
        self.probe
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
