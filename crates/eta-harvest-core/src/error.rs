//! Error types for the eta-harvest-core library.

use thiserror::Error;

/// Main error type for the harvest library.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The render target failed to serve or act on the document.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// A harvest run is already active for this harvester.
    #[error("already processing")]
    AlreadyRunning,

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by a [`PageDriver`](crate::dom::PageDriver) implementation.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The current document could not be serialized.
    #[error("failed to read document: {0}")]
    Snapshot(String),

    /// The click target no longer resolves to an element.
    #[error("element not found: {selector} #{index}")]
    ElementNotFound { selector: String, index: usize },

    /// Dispatching the click failed.
    #[error("click failed: {0}")]
    Click(String),

    /// The render target has gone away (tab closed, session ended).
    #[error("render target disconnected")]
    Disconnected,
}

/// Result type for the harvest library.
pub type Result<T> = std::result::Result<T, HarvestError>;
