//! Quote persistence hook.
//!
//! The in-memory store keeps recent aggregations only: entries expire after
//! a TTL and the number of stored sets is capped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;

use crate::errors::QuoteEngineError;
use crate::models::{Quote, QuoteRequest};

pub const DEFAULT_STORE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_STORE_MAX_SETS: u64 = 10_000;

/// Quotes saved for one aggregation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuoteSet {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub request: QuoteRequest,
    pub quotes: Vec<Quote>,
    pub created_at: DateTime<Utc>,
}

/// Persists aggregated quotes for later retrieval.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn save_quotes(&self, set: StoredQuoteSet) -> Result<(), QuoteEngineError>;

    async fn get_quote_set(&self, request_id: &str)
        -> Result<Option<StoredQuoteSet>, QuoteEngineError>;

    async fn get_quote(&self, quote_id: &str) -> Result<Option<Quote>, QuoteEngineError>;
}

/// [`QuoteStore`] backed by a bounded TTL cache.
pub struct InMemoryQuoteStore {
    sets: Cache<String, StoredQuoteSet>,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_STORE_TTL, DEFAULT_STORE_MAX_SETS)
    }

    pub fn with_limits(ttl: Duration, max_sets: u64) -> Self {
        Self {
            sets: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_sets)
                .build(),
        }
    }

    /// Number of live sets, after pending evictions are applied.
    pub async fn len(&self) -> u64 {
        self.sets.run_pending_tasks().await;
        self.sets.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryQuoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn save_quotes(&self, set: StoredQuoteSet) -> Result<(), QuoteEngineError> {
        self.sets.insert(set.request_id.clone(), set).await;
        Ok(())
    }

    async fn get_quote_set(
        &self,
        request_id: &str,
    ) -> Result<Option<StoredQuoteSet>, QuoteEngineError> {
        Ok(self.sets.get(request_id).await)
    }

    async fn get_quote(&self, quote_id: &str) -> Result<Option<Quote>, QuoteEngineError> {
        Ok(self.sets.iter().find_map(|(_, set)| {
            set.quotes
                .into_iter()
                .find(|quote| quote.quote_id == quote_id)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote_set(request_id: &str) -> StoredQuoteSet {
        StoredQuoteSet {
            request_id: request_id.to_string(),
            organization_id: None,
            request: QuoteRequest::new("pet", 30, "10001", dec!(5000)),
            quotes: vec![Quote::new("PETPAW", "PetPaw", dec!(32), dec!(5000), Utc::now())],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_lookup() {
        let store = InMemoryQuoteStore::new();
        let set = quote_set("req_1");
        let quote_id = set.quotes[0].quote_id.clone();

        store.save_quotes(set).await.unwrap();

        assert_eq!(store.len().await, 1);
        let set = store.get_quote_set("req_1").await.unwrap().unwrap();
        assert_eq!(set.quotes.len(), 1);

        let found = store.get_quote(&quote_id).await.unwrap().unwrap();
        assert_eq!(found.provider_id, "PETPAW");
        assert!(store.get_quote("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sets_expire_after_ttl() {
        let store = InMemoryQuoteStore::with_limits(Duration::from_millis(50), 100);
        store.save_quotes(quote_set("req_1")).await.unwrap();
        assert!(store.get_quote_set("req_1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(store.get_quote_set("req_1").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_stored_sets_are_capped() {
        let store = InMemoryQuoteStore::with_limits(DEFAULT_STORE_TTL, 5);
        for i in 0..50 {
            store
                .save_quotes(quote_set(&format!("req_{}", i)))
                .await
                .unwrap();
        }

        assert!(store.len().await <= 5);
    }
}
