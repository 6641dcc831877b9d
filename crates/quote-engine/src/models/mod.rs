//! Domain models for quote aggregation.

mod aggregation;
mod coverage;
mod health;
mod provider_config;
mod quote;
mod request;

pub use aggregation::{
    AggregationResult, OutcomeStatus, ProviderError, ProviderOutcome, ProviderSummary,
};
pub use coverage::CoverageType;
pub use health::ProviderHealth;
pub use provider_config::{
    AuthScheme, EffectiveProviderConfig, OrganizationOverride, ProviderConfig, RateLimitSettings,
    RetryPolicy,
};
pub use quote::Quote;
pub use request::{
    Child, HealthInfo, PaymentFrequency, QuoteRequest, Spouse, MAX_APPLICANT_AGE, MAX_CHILD_AGE,
    MIN_APPLICANT_AGE,
};
