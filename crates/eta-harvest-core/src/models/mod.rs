//! Data models.

pub mod config;
pub mod record;
pub mod snapshot;

pub use config::HarvestConfig;
pub use record::{Field, InvoiceRecord, LineItemDetail};
pub use snapshot::{ExtractionSource, PageHints, PageSnapshot};
