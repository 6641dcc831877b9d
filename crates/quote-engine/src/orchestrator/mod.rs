//! Quote aggregation orchestration.
//!
//! - [`QuoteOrchestrator`]: validated fan-out to every eligible provider
//! - [`HealthTracker`] / [`start_health_monitor`]: periodic provider probes
//! - [`OverrideStore`]: organization-level provider overrides
//! - [`QuoteStore`]: persistence hook for aggregated quotes
//! - [`QuoteEventSink`]: realtime progress events
//! - [`ResponseCache`]: optional TTL cache of aggregation results

mod cache;
mod events;
mod health;
#[allow(clippy::module_inception)]
mod orchestrator;
mod overrides;
mod store;

pub use cache::{CacheSettings, ResponseCache};
pub use events::{NoOpQuoteEventSink, QuoteEvent, QuoteEventSink, RecordingQuoteEventSink};
pub use health::{start_health_monitor, HealthTracker, DEFAULT_HEALTH_INTERVAL};
pub use orchestrator::{generate_request_id, sort_by_priority_then_premium, QuoteOrchestrator};
pub use overrides::{InMemoryOverrideStore, OverrideMap, OverrideStore};
pub use store::{
    InMemoryQuoteStore, QuoteStore, StoredQuoteSet, DEFAULT_STORE_MAX_SETS, DEFAULT_STORE_TTL,
};
