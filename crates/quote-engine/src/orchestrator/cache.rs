//! Optional aggregation response cache (off unless enabled).

use std::collections::BTreeMap;
use std::time::Duration;

use moka::future::Cache;

use crate::models::{AggregationResult, CoverageType, QuoteRequest};

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_ENTRIES: u64 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// TTL cache of aggregation results keyed by the normalized request.
pub struct ResponseCache {
    inner: Option<Cache<String, AggregationResult>>,
}

impl ResponseCache {
    pub fn new(settings: &CacheSettings) -> Self {
        let inner = settings.enabled.then(|| {
            Cache::builder()
                .time_to_live(settings.ttl)
                .max_capacity(settings.max_entries)
                .build()
        });
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Cache key: organization, resolved coverage, the canonical request and
    /// the per-call headers.
    pub fn key(
        request: &QuoteRequest,
        coverage: CoverageType,
        organization_id: Option<&str>,
        headers: &BTreeMap<String, String>,
    ) -> String {
        let mut canonical = request.clone();
        canonical.coverage_type = coverage.as_str().to_string();
        let body = serde_json::to_string(&canonical).unwrap_or_default();
        let headers = serde_json::to_string(headers).unwrap_or_default();
        format!("{}|{}|{}", organization_id.unwrap_or("-"), body, headers)
    }

    /// Cached result for `key`, flagged as cached.
    pub async fn get(&self, key: &str) -> Option<AggregationResult> {
        let cache = self.inner.as_ref()?;
        let mut result = cache.get(key).await?;
        result.cached = true;
        Some(result)
    }

    pub async fn insert(&self, key: String, result: AggregationResult) {
        if let Some(cache) = &self.inner {
            cache.insert(key, result).await;
        }
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderSummary;
    use rust_decimal_macros::dec;

    fn result() -> AggregationResult {
        AggregationResult {
            quotes: Vec::new(),
            providers: ProviderSummary::default(),
            outcomes: Vec::new(),
            request_id: "req_1".to_string(),
            cached: false,
        }
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = ResponseCache::new(&CacheSettings::default());
        assert!(!cache.is_enabled());

        cache.insert("k".to_string(), result()).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_enabled_cache_flags_hits() {
        let cache = ResponseCache::new(&CacheSettings {
            enabled: true,
            ..Default::default()
        });

        cache.insert("k".to_string(), result()).await;
        let hit = cache.get("k").await.unwrap();
        assert!(hit.cached);
        assert_eq!(hit.request_id, "req_1");
    }

    #[test]
    fn test_key_normalizes_coverage_alias() {
        let mut request = QuoteRequest::new("life", 30, "10001", dec!(100000));
        let headers = BTreeMap::new();
        let a = ResponseCache::key(&request, CoverageType::TermLife, Some("org"), &headers);

        request.coverage_type = "Term Life Insurance".to_string();
        let b = ResponseCache::key(&request, CoverageType::TermLife, Some("org"), &headers);
        assert_eq!(a, b);

        let c = ResponseCache::key(&request, CoverageType::TermLife, None, &headers);
        assert_ne!(a, c);
    }
}
