//! Session-scoped cache of captured listing responses.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;

use super::CapturedResponse;

/// Query parameters that only bust caches and never change the response.
const VOLATILE_PARAMS: &[&str] = &[
    "_",
    "t",
    "ts",
    "timestamp",
    "cacheBuster",
    "cb",
    "nocache",
    "rnd",
    "random",
];

/// Normalized request signature: host, path and sorted query without
/// cache-busting parameters. Unparseable URLs are used verbatim.
pub fn request_signature(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let mut query: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !VOLATILE_PARAMS.iter().any(|v| v.eq_ignore_ascii_case(k)))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    query.sort();

    let query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}{}?{}",
        parsed.host_str().unwrap_or_default().to_lowercase(),
        parsed.path(),
        query
    )
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub signature: String,
    pub url: String,
    pub payload: Value,
    pub captured_at: Instant,
}

/// Captured responses by request signature, oldest first.
///
/// A repeated request replaces its earlier entry and becomes the newest.
#[derive(Debug)]
pub struct NetworkCache {
    freshness: Duration,
    entries: IndexMap<String, CacheEntry>,
}

impl NetworkCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            entries: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, captured: CapturedResponse) {
        let signature = request_signature(&captured.url);
        self.entries.shift_remove(&signature);
        self.entries.insert(
            signature.clone(),
            CacheEntry {
                signature,
                url: captured.url,
                payload: captured.payload,
                captured_at: captured.captured_at,
            },
        );
    }

    /// Drop entries older than the freshness window.
    pub fn prune(&mut self, now: Instant) {
        let freshness = self.freshness;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.captured_at) <= freshness);
    }

    /// Fresh entries, newest first, captured no earlier than `not_before`.
    pub fn fresh(
        &self,
        now: Instant,
        not_before: Option<Instant>,
    ) -> impl Iterator<Item = &CacheEntry> + '_ {
        let freshness = self.freshness;
        self.entries.values().rev().filter(move |e| {
            now.saturating_duration_since(e.captured_at) <= freshness
                && not_before.is_none_or(|t| e.captured_at >= t)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn captured(url: &str, at: Instant) -> CapturedResponse {
        CapturedResponse {
            url: url.to_string(),
            payload: json!({"url": url}),
            captured_at: at,
        }
    }

    #[test]
    fn test_signature_drops_volatile_params() {
        assert_eq!(
            request_signature("https://Invoicing.eta.gov.eg/api/documents?pageSize=10&page=2&_=1700000000&cacheBuster=9"),
            "invoicing.eta.gov.eg/api/documents?page=2&pageSize=10"
        );
        assert_eq!(
            request_signature("https://invoicing.eta.gov.eg/api/documents?page=2&t=1"),
            request_signature("https://invoicing.eta.gov.eg/api/documents?t=2&page=2")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_request_replaces_entry() {
        let mut cache = NetworkCache::new(Duration::from_secs(15));
        let start = Instant::now();

        cache.insert(captured("https://invoicing.eta.gov.eg/documents?page=1&_=1", start));
        cache.insert(captured("https://invoicing.eta.gov.eg/documents?page=2", start));
        cache.insert(captured("https://invoicing.eta.gov.eg/documents?page=1&_=2", start));

        assert_eq!(cache.len(), 2);
        let newest = cache.fresh(start, None).next().unwrap();
        assert_eq!(newest.url, "https://invoicing.eta.gov.eg/documents?page=1&_=2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness_and_navigation_cutoff() {
        let mut cache = NetworkCache::new(Duration::from_secs(15));
        let start = Instant::now();
        cache.insert(captured("https://invoicing.eta.gov.eg/documents?page=1", start));

        tokio::time::advance(Duration::from_secs(5)).await;
        let clicked = Instant::now();
        assert_eq!(cache.fresh(clicked, None).count(), 1);
        assert_eq!(cache.fresh(clicked, Some(clicked)).count(), 0);

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.prune(Instant::now());
        assert!(cache.is_empty());
    }
}
