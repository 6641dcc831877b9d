//! Aggregation result returned by the orchestrator.

use serde::{Deserialize, Serialize};

use super::quote::Quote;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// One provider's failure, surfaced to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    pub provider_id: String,
    pub provider_name: String,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<ProviderError>,
}

/// Per-provider record of how the call went.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutcome {
    pub provider_id: String,
    pub provider_name: String,
    pub status: OutcomeStatus,
    pub quote_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub quotes: Vec<Quote>,
    pub providers: ProviderSummary,
    pub outcomes: Vec<ProviderOutcome>,
    pub request_id: String,
    pub cached: bool,
}
