//! Progress events emitted while aggregating.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::models::{OutcomeStatus, Quote};

/// Events the orchestrator emits for realtime consumers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuoteEvent {
    /// One provider finished, successfully or not.
    #[serde(rename_all = "camelCase")]
    ProviderCompleted {
        request_id: String,
        provider_id: String,
        status: OutcomeStatus,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        quotes: Vec<Quote>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Every provider has settled.
    #[serde(rename_all = "camelCase")]
    AggregationCompleted {
        request_id: String,
        total: usize,
        successful: usize,
        failed: usize,
        quote_count: usize,
    },
}

impl QuoteEvent {
    pub fn request_id(&self) -> &str {
        match self {
            Self::ProviderCompleted { request_id, .. }
            | Self::AggregationCompleted { request_id, .. } => request_id,
        }
    }
}

/// Receives aggregation progress events.
///
/// `emit()` is called from provider tasks and must not block. Delivery is
/// best-effort; a failing sink never affects the aggregation.
pub trait QuoteEventSink: Send + Sync {
    fn emit(&self, event: QuoteEvent);
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpQuoteEventSink;

impl QuoteEventSink for NoOpQuoteEventSink {
    fn emit(&self, _event: QuoteEvent) {}
}

/// Collects events in memory, for tests and local debugging.
#[derive(Clone, Default)]
pub struct RecordingQuoteEventSink {
    events: Arc<Mutex<Vec<QuoteEvent>>>,
}

impl RecordingQuoteEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QuoteEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns all collected events.
    pub fn events(&self) -> Vec<QuoteEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl QuoteEventSink for RecordingQuoteEventSink {
    fn emit(&self, event: QuoteEvent) {
        self.lock().push(event);
    }
}
