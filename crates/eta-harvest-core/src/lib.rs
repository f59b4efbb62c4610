//! Core library for harvesting invoice listings from the e-invoicing portal.
//!
//! This crate provides:
//! - Field extraction from rendered listing rows and intercepted API items
//! - Network capture filtering and a freshness-bounded response cache
//! - Per-page reconciliation between the network and document channels
//! - Pagination discovery, navigation and termination
//! - A single-flight multi-page harvester with progress reporting
//! - A request/response service surface for an external controller

pub mod dom;
pub mod error;
pub mod harvest;
pub mod invoice;
pub mod models;
pub mod network;
pub mod pagination;
pub mod reconcile;
pub mod replay;
pub mod service;

#[cfg(test)]
mod testing;

pub use dom::{ElementTarget, PageDriver};
pub use error::{DriverError, HarvestError, Result};
pub use harvest::{
    HarvestOptions, HarvestReport, Harvester, NoProgress, ProgressSink, ProgressUpdate, Termination,
};
pub use invoice::{InvoiceExtractor, RecordExtractor, RecordSource};
pub use models::{ExtractionSource, HarvestConfig, InvoiceRecord, LineItemDetail, PageHints, PageSnapshot};
pub use network::{InterceptFilter, NetworkObserver, NetworkTap};
pub use reconcile::SourceReconciler;
pub use replay::{ReplayCapture, ReplayDriver, ReplayPage};
pub use service::{Request, Response, Service};
