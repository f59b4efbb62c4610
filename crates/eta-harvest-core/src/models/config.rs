//! Configuration structures for the harvest pipeline.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main configuration for a harvester.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Target portal description.
    pub portal: PortalConfig,

    /// Network response cache.
    pub cache: CacheConfig,

    /// Pagination limits.
    pub pagination: PaginationConfig,

    /// Waits and delays.
    pub timing: TimingConfig,

    /// Field extraction.
    pub extraction: ExtractionConfig,
}

/// Which traffic belongs to the portal and how share links are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Host of the portal; subdomains also match.
    pub domain: String,

    /// A captured request is kept only when its path or query contains one of these.
    pub listing_tokens: Vec<String>,

    /// Prefix of derived external share links.
    pub share_base_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            domain: "invoicing.eta.gov.eg".to_string(),
            listing_tokens: vec![
                "documents".to_string(),
                "search".to_string(),
                "list".to_string(),
            ],
            share_base_url: "https://invoicing.eta.gov.eg/documents/".to_string(),
        }
    }
}

/// Network response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of a captured payload that still represents the current page.
    pub freshness_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { freshness_ms: 15_000 }
    }
}

impl CacheConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }
}

/// Pagination limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size assumed when neither the payload nor the pager tells.
    pub default_page_size: u32,

    /// Hard cap on total pages (and on harvest cycles).
    pub max_pages: u32,

    /// Identical page signatures after navigation before the run is declared stuck.
    pub max_stuck_pages: u32,

    /// Consecutive empty pages before the run stops.
    pub max_empty_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_pages: 100,
            max_stuck_pages: 3,
            max_empty_pages: 3,
        }
    }
}

/// Waits and delays, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay after every navigation click.
    pub settle_ms: u64,

    /// Interval of the content-ready poll.
    pub poll_interval_ms: u64,

    /// Content-ready timeout for the first page.
    pub first_ready_timeout_ms: u64,

    /// Content-ready timeout after a navigation.
    pub next_ready_timeout_ms: u64,

    /// Extra wait once rows appear, letting the content stabilize.
    pub stabilize_ms: u64,

    /// Pacing delay between page cycles.
    pub pacing_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: 300,
            poll_interval_ms: 100,
            first_ready_timeout_ms: 5_000,
            next_ready_timeout_ms: 3_000,
            stabilize_ms: 200,
            pacing_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stabilize(&self) -> Duration {
        Duration::from_millis(self.stabilize_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// How long to wait for rows to render; the first page gets longer.
    pub fn ready_timeout(&self, first_page: bool) -> Duration {
        if first_page {
            Duration::from_millis(self.first_ready_timeout_ms)
        } else {
            Duration::from_millis(self.next_ready_timeout_ms)
        }
    }
}

/// Invoice field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Flat VAT rate used to split a gross total when no tax is given.
    pub tax_rate: Decimal,

    /// Currency assumed when amounts carry no currency.
    pub default_currency: String,

    /// Number of leading cells/properties inspected by the positional strategy.
    pub positional_window: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(14, 2),
            default_currency: "EGP".to_string(),
            positional_window: 12,
        }
    }
}

impl HarvestConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: HarvestConfig =
            serde_json::from_str(r#"{"pagination": {"max_pages": 5}}"#).unwrap();

        assert_eq!(config.pagination.max_pages, 5);
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.cache.freshness_ms, 15_000);
        assert_eq!(config.extraction.tax_rate, Decimal::new(14, 2));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("eta-harvest-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = HarvestConfig::default();
        config.portal.domain = "portal.example".to_string();
        config.save(&path).unwrap();

        let loaded = HarvestConfig::from_file(&path).unwrap();
        assert_eq!(loaded.portal.domain, "portal.example");

        std::fs::remove_dir_all(&dir).ok();
    }
}
