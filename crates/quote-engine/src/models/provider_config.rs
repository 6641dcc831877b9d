//! Provider configuration and the per-organization override layer.

use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::coverage::CoverageType;
use crate::errors::QuoteEngineError;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PRIORITY: i32 = 10;

/// How the API key is attached to outgoing requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// `<name>: <key>`
    Header {
        #[serde(rename = "headerName")]
        name: String,
    },
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No credentials.
    None,
}

impl Default for AuthScheme {
    fn default() -> Self {
        Self::Header {
            name: "X-API-Key".to_string(),
        }
    }
}

/// Token bucket parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSettings {
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
            burst: 10,
        }
    }
}

/// Slowest accepted refill rate: one token every 1000 seconds.
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

/// Longest accepted first retry delay.
pub const MAX_INITIAL_DELAY_MS: u64 = 60_000;

/// Largest accepted backoff multiplier.
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

impl RateLimitSettings {
    pub fn validate(&self) -> Result<(), QuoteEngineError> {
        if !(self.requests_per_second.is_finite()
            && self.requests_per_second >= MIN_REQUESTS_PER_SECOND)
        {
            return Err(QuoteEngineError::Config {
                message: format!(
                    "requestsPerSecond must be at least {}, got {}",
                    MIN_REQUESTS_PER_SECOND, self.requests_per_second
                ),
            });
        }
        if self.burst < 1 {
            return Err(QuoteEngineError::Config {
                message: "burst must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Exponential backoff policy for transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_multiplier: f64,
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_multiplier: 2.0,
            initial_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based):
    /// `initialDelay * backoffMultiplier^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        Duration::try_from_secs_f64(self.initial_delay_ms as f64 * factor / 1000.0)
            .unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), QuoteEngineError> {
        if !(self.backoff_multiplier.is_finite()
            && (1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.backoff_multiplier))
        {
            return Err(QuoteEngineError::Config {
                message: format!(
                    "backoffMultiplier must be between 1 and {}, got {}",
                    MAX_BACKOFF_MULTIPLIER, self.backoff_multiplier
                ),
            });
        }
        if self.initial_delay_ms > MAX_INITIAL_DELAY_MS {
            return Err(QuoteEngineError::Config {
                message: format!(
                    "initialDelayMs must be <= {}, got {}",
                    MAX_INITIAL_DELAY_MS, self.initial_delay_ms
                ),
            });
        }
        if self.max_retries > 10 {
            return Err(QuoteEngineError::Config {
                message: format!("maxRetries must be <= 10, got {}", self.max_retries),
            });
        }
        Ok(())
    }
}

/// Static description of one upstream quoting API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthScheme,
    /// Never serialized; injected from the environment at startup.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    pub supported_coverage_types: Vec<CoverageType>,
    /// Lower is preferred.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub mock_mode: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        supported_coverage_types: Vec<CoverageType>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            auth: AuthScheme::default(),
            api_key: None,
            rate_limit: RateLimitSettings::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            supported_coverage_types,
            priority: DEFAULT_PRIORITY,
            active: true,
            mock_mode: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn supports(&self, coverage: CoverageType) -> bool {
        self.supported_coverage_types.contains(&coverage)
    }

    /// Base URL without a trailing slash, ready for path joining.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Rejects configurations that would deadlock or misbehave at runtime.
    pub fn validate(&self) -> Result<(), QuoteEngineError> {
        let invalid = |message: String| QuoteEngineError::Config {
            message: format!("provider '{}': {}", self.id, message),
        };

        if self.id.trim().is_empty() {
            return Err(QuoteEngineError::Config {
                message: "provider id must not be empty".to_string(),
            });
        }
        if !self.mock_mode && !self.base_url.starts_with("http") {
            return Err(invalid(format!("invalid base URL '{}'", self.base_url)));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeoutMs must be greater than zero".to_string()));
        }
        if self.supported_coverage_types.is_empty() {
            return Err(invalid("at least one coverage type is required".to_string()));
        }
        let scoped = |error: QuoteEngineError| match error {
            QuoteEngineError::Config { message } => invalid(message),
            other => other,
        };
        self.rate_limit.validate().map_err(scoped)?;
        self.retry.validate().map_err(scoped)?;
        Ok(())
    }
}

/// Organization-specific layer applied on top of a [`ProviderConfig`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSettings>,
}

/// Provider configuration after an organization's overrides are merged in.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectiveProviderConfig {
    pub config: ProviderConfig,
    pub organization_id: Option<String>,
    pub commission_rate: Option<Decimal>,
    pub custom_headers: BTreeMap<String, String>,
    /// Set when the organization brings its own rate limit.
    pub rate_limit_override: Option<RateLimitSettings>,
}

impl EffectiveProviderConfig {
    pub fn merge(
        base: &ProviderConfig,
        organization_id: Option<&str>,
        layer: Option<&OrganizationOverride>,
    ) -> Self {
        let mut config = base.clone();
        let Some(layer) = layer else {
            return Self {
                config,
                organization_id: organization_id.map(str::to_string),
                commission_rate: None,
                custom_headers: BTreeMap::new(),
                rate_limit_override: None,
            };
        };

        if let Some(priority) = layer.priority {
            config.priority = priority;
        }
        if let Some(active) = layer.active {
            config.active = active;
        }
        if let Some(timeout_ms) = layer.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(rate_limit) = layer.rate_limit {
            config.rate_limit = rate_limit;
        }

        Self {
            config,
            organization_id: organization_id.map(str::to_string),
            commission_rate: layer.commission_rate,
            custom_headers: layer.custom_headers.clone(),
            rate_limit_override: layer.rate_limit,
        }
    }
}
