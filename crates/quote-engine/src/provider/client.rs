//! HTTP provider client.
//!
//! One [`ProviderClient`] per configured provider. A call goes:
//! mock short-circuit, rate limiter, then up to `1 + maxRetries` attempts of
//! `POST <baseUrl>/quotes`, each bounded by the provider timeout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::mapping::ProviderMapping;
use super::mock;
use super::normalize::parse_quotes;
use super::retry::{retry_with_backoff, with_timeout};
use super::traits::{ProviderCall, QuoteProvider};
use crate::errors::QuoteEngineError;
use crate::models::{AuthScheme, ProviderConfig, Quote, QuoteRequest};

const QUOTES_PATH: &str = "quotes";
const HEALTH_PATH: &str = "health";

/// HTTP implementation of [`QuoteProvider`].
pub struct ProviderClient {
    id: String,
    http: Client,
    mapping: ProviderMapping,
}

impl ProviderClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, QuoteEngineError> {
        let http = Client::builder()
            .user_agent(concat!("covermesh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QuoteEngineError::Config {
                message: format!("failed to build HTTP client for '{}': {}", config.id, e),
            })?;

        Ok(Self::with_http_client(config, http))
    }

    /// Build a client around an existing `reqwest::Client` (shared pools).
    pub fn with_http_client(config: &ProviderConfig, http: Client) -> Self {
        Self {
            id: config.id.clone(),
            http,
            mapping: ProviderMapping::for_provider(&config.id),
        }
    }

    pub fn mapping(&self) -> ProviderMapping {
        self.mapping
    }

    /// Auth header plus the call's extra headers, in that order.
    fn build_headers(&self, call: &ProviderCall) -> Result<HeaderMap, QuoteEngineError> {
        let mut headers = HeaderMap::new();

        if let Some(key) = call.config.api_key.as_deref() {
            match &call.config.auth {
                AuthScheme::Header { name } => {
                    headers.insert(self.header_name(name)?, self.header_value(key)?);
                }
                AuthScheme::Bearer => {
                    headers.insert(AUTHORIZATION, self.header_value(&format!("Bearer {}", key))?);
                }
                AuthScheme::None => {}
            }
        } else if call.config.auth != AuthScheme::None {
            debug!("{}: no API key configured, sending unauthenticated", self.id);
        }

        for (name, value) in &call.headers {
            headers.insert(self.header_name(name)?, self.header_value(value)?);
        }

        Ok(headers)
    }

    fn header_name(&self, name: &str) -> Result<HeaderName, QuoteEngineError> {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| QuoteEngineError::Config {
            message: format!("provider '{}': invalid header name '{}'", self.id, name),
        })
    }

    fn header_value(&self, value: &str) -> Result<HeaderValue, QuoteEngineError> {
        HeaderValue::from_str(value).map_err(|_| QuoteEngineError::Config {
            message: format!("provider '{}': invalid header value", self.id),
        })
    }

    fn transport_error(&self, error: reqwest::Error, timeout: Duration) -> QuoteEngineError {
        if error.is_timeout() {
            QuoteEngineError::Timeout {
                provider: self.id.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }
        } else if error.is_decode() {
            QuoteEngineError::InvalidResponse {
                provider: self.id.clone(),
                message: format!("Failed to decode response: {}", error),
            }
        } else {
            QuoteEngineError::Network {
                provider: self.id.clone(),
                message: format!("Request failed: {}", error),
            }
        }
    }

    fn status_error(&self, status: reqwest::StatusCode) -> QuoteEngineError {
        QuoteEngineError::Http {
            provider: self.id.clone(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    /// One attempt: send, check status, parse.
    async fn attempt(
        &self,
        request: &QuoteRequest,
        call: &ProviderCall,
        headers: &HeaderMap,
        body: &Value,
    ) -> Result<Vec<Quote>, QuoteEngineError> {
        let timeout = call.config.timeout();
        let url = call.config.endpoint(QUOTES_PATH);

        let payload = with_timeout(&self.id, timeout, async {
            let response = self
                .http
                .post(&url)
                .headers(headers.clone())
                .json(body)
                .send()
                .await
                .map_err(|e| self.transport_error(e, timeout))?;

            let status = response.status();
            if !status.is_success() {
                return Err(self.status_error(status));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| self.transport_error(e, timeout))
        })
        .await?;

        parse_quotes(
            &self.id,
            &call.config.name,
            &payload,
            request,
            call.coverage,
        )
    }
}

#[async_trait]
impl QuoteProvider for ProviderClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_quotes(
        &self,
        request: &QuoteRequest,
        call: &ProviderCall,
    ) -> Result<Vec<Quote>, QuoteEngineError> {
        if call.config.mock_mode {
            let quotes = mock::generate_quotes(&call.config, request, call.coverage);
            debug!("{}: generated {} mock quote(s)", self.id, quotes.len());
            return Ok(quotes);
        }

        call.limiter.acquire().await;

        let headers = self.build_headers(call)?;
        let body = self.mapping.build_request(request, call.coverage);
        debug!(
            "{}: requesting {} quotes via {:?} mapping",
            self.id, call.coverage, self.mapping
        );

        let quotes = retry_with_backoff(&self.id, &call.config.retry, || {
            self.attempt(request, call, &headers, &body)
        })
        .await?;

        debug!("{}: received {} quote(s)", self.id, quotes.len());
        Ok(quotes)
    }

    async fn check_connectivity(
        &self,
        config: &ProviderConfig,
    ) -> Result<Duration, QuoteEngineError> {
        if config.mock_mode {
            return Ok(Duration::ZERO);
        }

        let timeout = config.timeout();
        let url = config.endpoint(HEALTH_PATH);
        let started = Instant::now();

        let status = with_timeout(&self.id, timeout, async {
            self.http
                .get(&url)
                .send()
                .await
                .map(|response| response.status())
                .map_err(|e| self.transport_error(e, timeout))
        })
        .await?;

        if !status.is_success() {
            warn!("{}: connectivity check returned {}", self.id, status);
            return Err(self.status_error(status));
        }

        Ok(started.elapsed())
    }
}
