//! Intercepted network responses: capture boundary, session cache and listing recognition.

mod cache;
mod listing;

pub use cache::{request_signature, CacheEntry, NetworkCache};
pub use listing::{recognize, Listing};

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::models::HarvestConfig;

/// A listing response captured at the interception boundary.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub url: String,
    pub payload: Value,
    pub captured_at: Instant,
}

/// Push-style source of captured responses.
///
/// Each subscriber gets its own receiver; a dropped receiver unsubscribes.
pub trait NetworkObserver: Send + Sync {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<CapturedResponse>;
}

/// Which responses count as listing traffic.
#[derive(Debug, Clone)]
pub struct InterceptFilter {
    domain: String,
    tokens: Vec<String>,
}

impl InterceptFilter {
    pub fn new(domain: impl Into<String>, tokens: Vec<String>) -> Self {
        Self {
            domain: domain.into().to_lowercase(),
            tokens: tokens.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(config.portal.domain.clone(), config.portal.listing_tokens.clone())
    }

    /// The host must be the portal domain or one of its subdomains, and the
    /// path or query must mention a listing token.
    pub fn accepts(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        let on_portal = host == self.domain || host.ends_with(&format!(".{}", self.domain));
        if !on_portal {
            return false;
        }

        let path = url.path().to_lowercase();
        let query = url.query().unwrap_or_default().to_lowercase();
        self.tokens
            .iter()
            .any(|t| path.contains(t.as_str()) || query.contains(t.as_str()))
    }
}

/// The interception boundary. The host environment hands every completed
/// response to [`NetworkTap::publish`]; matching JSON bodies are fanned out
/// to all live subscribers.
#[derive(Debug)]
pub struct NetworkTap {
    filter: InterceptFilter,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CapturedResponse>>>,
}

impl NetworkTap {
    pub fn new(filter: InterceptFilter) -> Self {
        Self {
            filter,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(InterceptFilter::from_config(config))
    }

    /// Offer a response body. Returns whether it was captured.
    ///
    /// Non-matching URLs and bodies that are not JSON are ignored.
    pub fn publish(&self, url: &str, body: &str) -> bool {
        if !self.filter.accepts(url) {
            trace!(url, "Ignoring response outside listing traffic");
            return false;
        }

        let payload: Value = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(url, error = %e, "Ignoring non-JSON response");
                return false;
            }
        };

        let captured = CapturedResponse {
            url: url.to_string(),
            payload,
            captured_at: Instant::now(),
        };

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| tx.send(captured.clone()).is_ok());
        debug!(url, subscribers = subscribers.len(), "Captured listing response");
        true
    }
}

impl NetworkObserver for NetworkTap {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<CapturedResponse> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }
}

/// A session's view of the network channel: its own subscription and cache.
#[derive(Debug)]
pub struct NetworkSession {
    captures: mpsc::UnboundedReceiver<CapturedResponse>,
    cache: NetworkCache,
}

impl NetworkSession {
    pub fn new(observer: &dyn NetworkObserver, cache: NetworkCache) -> Self {
        Self {
            captures: observer.subscribe(),
            cache,
        }
    }

    /// Move every pending capture into the cache and drop expired entries.
    pub fn drain(&mut self) -> &NetworkCache {
        let mut drained = 0usize;
        while let Ok(captured) = self.captures.try_recv() {
            self.cache.insert(captured);
            drained += 1;
        }
        self.cache.prune(Instant::now());
        if drained > 0 {
            trace!(drained, cached = self.cache.len(), "Drained captures");
        }
        &self.cache
    }

    pub fn cache(&self) -> &NetworkCache {
        &self.cache
    }
}
