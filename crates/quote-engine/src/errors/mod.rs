//! Error types and retry classification for the quote engine.
//!
//! This module provides:
//! - [`QuoteEngineError`]: The main error enum for all aggregation operations
//! - [`ValidationError`]: Pre-flight request validation failures
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Request validation failures raised before any provider is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported coverage type '{value}'")]
    UnsupportedCoverageType { value: String },

    #[error("applicant age {age} must be between 18 and 100")]
    ApplicantAgeOutOfRange { age: u8 },

    #[error("zip code '{value}' must be exactly 5 digits")]
    InvalidZipCode { value: String },

    #[error("coverage amount must be greater than zero")]
    NonPositiveCoverageAmount,

    #[error("term length must be greater than zero")]
    InvalidTermLength,

    #[error("spouse age {age} must be between 18 and 100")]
    SpouseAgeOutOfRange { age: u8 },

    #[error("child #{index} age {age} must be between 0 and 25")]
    ChildAgeOutOfRange { index: usize, age: u8 },
}

/// Errors that can occur while aggregating quotes.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which the provider client uses to
/// decide whether an attempt should be repeated.
#[derive(Error, Debug, Clone)]
pub enum QuoteEngineError {
    /// The quote request failed validation. Aborts the whole aggregation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The provider did not answer within its configured timeout.
    #[error("Timeout: {provider} did not respond within {timeout_ms}ms")]
    Timeout {
        /// The provider that timed out
        provider: String,
        /// The timeout that was enforced
        timeout_ms: u64,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("HTTP error from {provider}: {status} {status_text}")]
    Http {
        /// The provider that returned the status
        provider: String,
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase or body excerpt
        status_text: String,
    },

    /// Connection-level failure (DNS, refused connection, broken body stream).
    #[error("Network error: {provider} - {message}")]
    Network {
        /// The provider that could not be reached
        provider: String,
        /// Transport error description
        message: String,
    },

    /// The circuit breaker is open for this provider.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// No client is registered for the provider.
    #[error("Provider unavailable: {provider}")]
    ProviderUnavailable {
        /// The provider id that has no client
        provider: String,
    },

    /// No active provider supports the requested coverage type.
    /// Aborts the whole aggregation.
    #[error("No eligible provider for coverage type '{coverage_type}'")]
    NoEligibleProvider {
        /// The normalized coverage type
        coverage_type: String,
    },

    /// The provider answered, but the body could not be interpreted.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that sent the body
        provider: String,
        /// Parse failure description
        message: String,
    },

    /// Provider configuration is unusable (e.g. zero refill rate).
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the invalid setting
        message: String,
    },

    /// A downstream store rejected a read or write.
    #[error("Storage error: {message}")]
    Storage {
        /// Store-specific failure description
        message: String,
    },

    /// The task running a provider call panicked or was aborted.
    #[error("Provider task failed: {provider} - {message}")]
    TaskFailed {
        /// The provider whose task failed
        provider: String,
        /// Join error description
        message: String,
    },
}

impl QuoteEngineError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use covermesh_quote_engine::errors::{QuoteEngineError, RetryClass};
    ///
    /// let error = QuoteEngineError::Timeout { provider: "LIFESHIELD".to_string(), timeout_ms: 5000 };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = QuoteEngineError::CircuitOpen { provider: "LIFESHIELD".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::CircuitOpen);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => RetryClass::WithBackoff,

            Self::Http { status, .. } => {
                if matches!(status, 408 | 429) || *status >= 500 {
                    RetryClass::WithBackoff
                } else {
                    RetryClass::Never
                }
            }

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            Self::Validation(_)
            | Self::ProviderUnavailable { .. }
            | Self::NoEligibleProvider { .. }
            | Self::InvalidResponse { .. }
            | Self::Config { .. }
            | Self::Storage { .. }
            | Self::TaskFailed { .. } => RetryClass::Never,
        }
    }

    /// Whether this error aborts the whole aggregation instead of being
    /// reported as a single provider's failure.
    pub fn aborts_request(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NoEligibleProvider { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_retries_with_backoff() {
        let error = QuoteEngineError::Timeout {
            provider: "LIFESHIELD".to_string(),
            timeout_ms: 5_000,
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_network_retries_with_backoff() {
        let error = QuoteEngineError::Network {
            provider: "HEALTHBRIDGE".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_http_classification_by_status() {
        let http = |status| QuoteEngineError::Http {
            provider: "AUTOGUARD".to_string(),
            status,
            status_text: String::new(),
        };

        assert_eq!(http(503).retry_class(), RetryClass::WithBackoff);
        assert_eq!(http(500).retry_class(), RetryClass::WithBackoff);
        assert_eq!(http(429).retry_class(), RetryClass::WithBackoff);
        assert_eq!(http(408).retry_class(), RetryClass::WithBackoff);
        assert_eq!(http(400).retry_class(), RetryClass::Never);
        assert_eq!(http(401).retry_class(), RetryClass::Never);
        assert_eq!(http(404).retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_circuit_open_is_never_retried() {
        let error = QuoteEngineError::CircuitOpen {
            provider: "DENTALCARE".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::CircuitOpen);
        assert!(!error.aborts_request());
    }

    #[test]
    fn test_request_level_errors_abort() {
        let error = QuoteEngineError::from(ValidationError::NonPositiveCoverageAmount);
        assert!(error.aborts_request());
        assert_eq!(error.retry_class(), RetryClass::Never);

        let error = QuoteEngineError::NoEligibleProvider {
            coverage_type: "pet".to_string(),
        };
        assert!(error.aborts_request());
    }

    #[test]
    fn test_error_display() {
        let error = QuoteEngineError::Http {
            provider: "HOMESAFE".to_string(),
            status: 502,
            status_text: "Bad Gateway".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "HTTP error from HOMESAFE: 502 Bad Gateway"
        );

        let error = QuoteEngineError::from(ValidationError::InvalidZipCode {
            value: "1234".to_string(),
        });
        assert_eq!(format!("{}", error), "zip code '1234' must be exactly 5 digits");
    }
}
