//! Quote provider trait definitions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::QuoteEngineError;
use crate::models::{CoverageType, ProviderConfig, Quote, QuoteRequest};
use crate::registry::RateLimiter;

/// Everything one provider call needs besides the request itself.
///
/// Built by the orchestrator per call, after organization overrides are merged.
#[derive(Clone, Debug)]
pub struct ProviderCall {
    /// Effective configuration (organization overrides applied).
    pub config: ProviderConfig,
    /// Canonical coverage type resolved from the request.
    pub coverage: CoverageType,
    /// Extra outgoing headers: organization custom headers first, then
    /// per-call headers.
    pub headers: BTreeMap<String, String>,
    /// Bucket gating this call.
    pub limiter: Arc<RateLimiter>,
}

/// Trait for quote providers.
///
/// [`ProviderClient`](super::ProviderClient) is the HTTP implementation; tests
/// register their own implementations to script outcomes.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier, e.g. "LIFESHIELD".
    ///
    /// Used for logging, circuit breaker tracking and mapping selection.
    fn id(&self) -> &str;

    /// Fetch quotes for a validated request.
    ///
    /// Implementations acquire `call.limiter` before touching the network
    /// and apply their own retry policy.
    async fn fetch_quotes(
        &self,
        request: &QuoteRequest,
        call: &ProviderCall,
    ) -> Result<Vec<Quote>, QuoteEngineError>;

    /// Probe the provider outside the hot path and return the round-trip time.
    async fn check_connectivity(
        &self,
        config: &ProviderConfig,
    ) -> Result<Duration, QuoteEngineError>;
}
