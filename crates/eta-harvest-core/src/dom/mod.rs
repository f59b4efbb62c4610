//! Rendered-document access: the render target abstraction and structural scanning.
//!
//! The engine never holds a live DOM. A [`PageDriver`] hands out the
//! serialized document as currently rendered; everything else works on a
//! parsed [`scraper::Html`] snapshot of it and addresses elements back in the
//! live document through [`ElementTarget`]s.

mod details;
mod scan;
mod visibility;

pub use details::scan_line_items;
pub use scan::{has_rendered_rows, scan_rows, RowScan, CELL_SELECTORS, PRIMARY_ROWS, SECONDARY_ROWS};
pub use visibility::ScanMemo;

use async_trait::async_trait;
use scraper::{ElementRef, Selector};

use crate::error::DriverError;
use crate::invoice::rules::collapse_whitespace;

/// The render target: a browser tab showing the portal.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Serialized HTML of the document as currently rendered.
    ///
    /// Implementations should serialize the live tree (including inline
    /// `style` changes made by scripts), not the originally loaded source.
    async fn content(&self) -> Result<String, DriverError>;

    /// Dispatch a click on the element `target` resolves to.
    async fn click(&self, target: &ElementTarget) -> Result<(), DriverError>;
}

/// An element addressed as the `index`-th match (document order, 0-based)
/// of `selector`, i.e. `document.querySelectorAll(selector)[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub selector: String,
    pub index: usize,
}

impl ElementTarget {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// A CSS selector kept together with its source text.
#[derive(Debug, Clone)]
pub struct NamedSelector {
    pub css: &'static str,
    pub selector: Selector,
}

impl NamedSelector {
    /// Parse a static selector. Panics on invalid CSS, which is a programming error.
    pub fn new(css: &'static str) -> Self {
        Self {
            css,
            selector: Selector::parse(css).unwrap(),
        }
    }
}

/// Whitespace-collapsed text content of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Memo key of an element: its address inside the parsed tree.
pub(crate) fn node_key(el: ElementRef<'_>) -> usize {
    std::ptr::from_ref(el.value()) as usize
}
