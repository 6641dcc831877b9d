//! Covermesh Quote Engine
//!
//! Collects insurance premium quotes from several carrier APIs at once and
//! merges them into one ranked result.
//!
//! # Overview
//!
//! - Concurrent fan-out to every eligible provider; one failure never
//!   affects the others
//! - Per-provider token bucket rate limiting and circuit breaking
//! - Per-provider request dialects and tolerant response parsing
//! - Organization overrides (priority, activation, commission, headers,
//!   rate limits)
//! - Background health probing
//! - Filtering, deduplication and comparison summaries
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  QuoteRequest    |  validate, resolve coverage type
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | QuoteOrchestrator| --> |  OverrideStore   |  (organization layer)
//! +------------------+     +------------------+
//!          |  one task per provider
//!          v
//! +------------------+
//! |  CircuitBreaker  |
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  RateLimiter     |
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  ProviderClient  |  mapping, retry, timeout, parsing (or mock)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! | AggregationResult|  sorted by priority, then premium
//! +------------------+
//! ```

pub mod catalog;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod ranking;
pub mod registry;

pub use errors::{QuoteEngineError, RetryClass, ValidationError};

pub use models::{
    AggregationResult, AuthScheme, CoverageType, EffectiveProviderConfig, OrganizationOverride,
    OutcomeStatus, PaymentFrequency, ProviderConfig, ProviderError, ProviderHealth,
    ProviderOutcome, ProviderSummary, Quote, QuoteRequest, RateLimitSettings, RetryPolicy,
};

// Re-export orchestration types
pub use orchestrator::{
    start_health_monitor, CacheSettings, HealthTracker, InMemoryOverrideStore,
    InMemoryQuoteStore, NoOpQuoteEventSink, OverrideStore, QuoteEvent, QuoteEventSink,
    QuoteOrchestrator, QuoteStore, RecordingQuoteEventSink, StoredQuoteSet,
    DEFAULT_HEALTH_INTERVAL, DEFAULT_STORE_MAX_SETS, DEFAULT_STORE_TTL,
};

// Re-export provider types
pub use provider::{ProviderCall, ProviderClient, ProviderMapping, QuoteProvider};

// Re-export ranking types
pub use ranking::{
    deduplicate_quotes, enrich_quotes_for_display, filter_quotes, generate_comparison_summary,
    merge_quotes, normalize_external_quotes, ComparisonSummary, DisplayQuote, QuoteFilters,
};

// Re-export registry types
pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStats, ProviderHandle,
    ProviderRegistry, RateLimiter,
};
