//! Quote orchestrator.
//!
//! Fans one validated request out to every eligible provider concurrently,
//! waits for all of them (no early cancellation), and merges the results.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::cache::{CacheSettings, ResponseCache};
use super::events::{NoOpQuoteEventSink, QuoteEvent, QuoteEventSink};
use super::health::HealthTracker;
use super::overrides::{InMemoryOverrideStore, OverrideMap, OverrideStore};
use super::store::{QuoteStore, StoredQuoteSet};
use crate::errors::QuoteEngineError;
use crate::models::{
    AggregationResult, CoverageType, EffectiveProviderConfig, OutcomeStatus, ProviderError,
    ProviderHealth, ProviderOutcome, ProviderSummary, Quote, QuoteRequest,
};
use crate::provider::ProviderCall;
use crate::registry::{CircuitStats, ProviderHandle, ProviderRegistry};

const REQUEST_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const REQUEST_ID_SUFFIX_LEN: usize = 9;

/// Synthetic applicant used by health probes.
const PROBE_AGE: u8 = 30;
const PROBE_ZIP: &str = "10001";
const PROBE_COVERAGE_AMOUNT: i64 = 100_000;

/// `req_<epochMillis>_<9 random base36 chars>`
pub fn generate_request_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REQUEST_ID_SUFFIX_LEN)
        .map(|_| REQUEST_ID_ALPHABET[rng.gen_range(0..REQUEST_ID_ALPHABET.len())] as char)
        .collect();
    format!("req_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// A provider chosen for this request, with its merged configuration.
struct Selected {
    handle: Arc<ProviderHandle>,
    effective: EffectiveProviderConfig,
}

/// How one provider's call ended.
struct Settled {
    provider_id: String,
    provider_name: String,
    result: Result<Vec<Quote>, QuoteEngineError>,
    elapsed: Duration,
}

/// Multi-provider quote aggregation entry point.
pub struct QuoteOrchestrator {
    registry: Arc<ProviderRegistry>,
    overrides: Arc<dyn OverrideStore>,
    events: Arc<dyn QuoteEventSink>,
    store: Option<Arc<dyn QuoteStore>>,
    cache: ResponseCache,
    health: HealthTracker,
}

impl QuoteOrchestrator {
    /// Orchestrator with in-memory overrides, no events, no store, cache off.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            overrides: Arc::new(InMemoryOverrideStore::new()),
            events: Arc::new(NoOpQuoteEventSink),
            store: None,
            cache: ResponseCache::disabled(),
            health: HealthTracker::new(),
        }
    }

    pub fn with_override_store(mut self, overrides: Arc<dyn OverrideStore>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn QuoteEventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_quote_store(mut self, store: Arc<dyn QuoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cache(mut self, settings: &CacheSettings) -> Self {
        self.cache = ResponseCache::new(settings);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn override_store(&self) -> &Arc<dyn OverrideStore> {
        &self.overrides
    }

    /// Aggregate quotes from every eligible provider.
    ///
    /// Validation failures and the absence of any eligible provider abort the
    /// call. Individual provider failures are reported in
    /// `result.providers.errors` and never affect siblings.
    pub async fn get_quotes(
        &self,
        request: &QuoteRequest,
        organization_id: Option<&str>,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<AggregationResult, QuoteEngineError> {
        let coverage = request.validate()?;
        let call_headers = headers.cloned().unwrap_or_default();

        let cache_key = self
            .cache
            .is_enabled()
            .then(|| ResponseCache::key(request, coverage, organization_id, &call_headers));
        if let Some(key) = &cache_key {
            if let Some(hit) = self.cache.get(key).await {
                debug!("Serving cached aggregation {}", hit.request_id);
                return Ok(hit);
            }
        }

        let overrides = self.load_overrides(organization_id).await;
        let selected = self.select_providers(coverage, organization_id, &overrides);
        if selected.is_empty() {
            warn!("No eligible provider for coverage type '{}'", coverage);
            return Err(QuoteEngineError::NoEligibleProvider {
                coverage_type: coverage.to_string(),
            });
        }

        let request_id = generate_request_id();
        info!(
            "{}: dispatching {} request to {} provider(s)",
            request_id,
            coverage,
            selected.len()
        );

        let settled = self
            .dispatch(&request_id, request, coverage, &call_headers, selected)
            .await;

        let result = self.merge(request_id, settled);

        self.events.emit(QuoteEvent::AggregationCompleted {
            request_id: result.request_id.clone(),
            total: result.providers.total,
            successful: result.providers.successful,
            failed: result.providers.failed,
            quote_count: result.quotes.len(),
        });
        info!(
            "{}: {} quote(s) from {}/{} provider(s)",
            result.request_id,
            result.quotes.len(),
            result.providers.successful,
            result.providers.total
        );

        if let Some(store) = &self.store {
            if !result.quotes.is_empty() {
                let set = StoredQuoteSet {
                    request_id: result.request_id.clone(),
                    organization_id: organization_id.map(str::to_string),
                    request: request.clone(),
                    quotes: result.quotes.clone(),
                    created_at: Utc::now(),
                };
                if let Err(e) = store.save_quotes(set).await {
                    warn!("{}: failed to persist quotes: {}", result.request_id, e);
                }
            }
        }

        if let Some(key) = cache_key {
            self.cache.insert(key, result.clone()).await;
        }

        Ok(result)
    }

    async fn load_overrides(&self, organization_id: Option<&str>) -> OverrideMap {
        let Some(organization_id) = organization_id else {
            return OverrideMap::new();
        };
        match self.overrides.get_overrides(organization_id).await {
            Ok(overrides) => overrides,
            Err(e) => {
                warn!(
                    "Failed to load overrides for organization '{}', using base config: {}",
                    organization_id, e
                );
                OverrideMap::new()
            }
        }
    }

    /// Active providers supporting `coverage`, overrides merged, sorted by
    /// effective priority (ties broken by id).
    fn select_providers(
        &self,
        coverage: CoverageType,
        organization_id: Option<&str>,
        overrides: &OverrideMap,
    ) -> Vec<Selected> {
        let mut selected: Vec<Selected> = self
            .registry
            .handles()
            .into_iter()
            .filter_map(|handle| {
                let effective = EffectiveProviderConfig::merge(
                    &handle.config(),
                    organization_id,
                    overrides.get(handle.id()),
                );
                let eligible = effective.config.active && effective.config.supports(coverage);
                if !eligible {
                    debug!("Skipping provider '{}' for {}", handle.id(), coverage);
                }
                eligible.then_some(Selected { handle, effective })
            })
            .collect();

        selected.sort_by(|a, b| {
            a.effective
                .config
                .priority
                .cmp(&b.effective.config.priority)
                .then_with(|| a.handle.id().cmp(b.handle.id()))
        });
        selected
    }

    /// One task per provider, joined with all-settled semantics.
    async fn dispatch(
        &self,
        request_id: &str,
        request: &QuoteRequest,
        coverage: CoverageType,
        call_headers: &BTreeMap<String, String>,
        selected: Vec<Selected>,
    ) -> Vec<Settled> {
        let request = Arc::new(request.clone());
        let mut names = Vec::with_capacity(selected.len());
        let mut tasks = Vec::with_capacity(selected.len());

        for Selected { handle, effective } in selected {
            let provider_id = handle.id().to_string();
            let provider_name = effective.config.name.clone();
            names.push((provider_id.clone(), provider_name.clone()));

            let limiter = handle.limiter_for(
                effective.organization_id.as_deref(),
                effective.rate_limit_override,
            );

            let mut headers = effective.custom_headers.clone();
            headers.extend(call_headers.iter().map(|(k, v)| (k.clone(), v.clone())));

            let request = Arc::clone(&request);
            let events = Arc::clone(&self.events);
            let request_id = request_id.to_string();

            tasks.push(tokio::spawn(async move {
                let started = Instant::now();
                let result = match limiter {
                    Ok(limiter) => {
                        let call = ProviderCall {
                            config: effective.config.clone(),
                            coverage,
                            headers,
                            limiter,
                        };
                        let client = handle.client();
                        handle
                            .breaker()
                            .execute(|| client.fetch_quotes(&request, &call))
                            .await
                    }
                    Err(e) => Err(e),
                };

                let result = result.map(|quotes| tag_quotes(quotes, &provider_id, &effective));
                let elapsed = started.elapsed();

                match &result {
                    Ok(quotes) => debug!(
                        "{}: '{}' returned {} quote(s) in {:?}",
                        request_id,
                        provider_id,
                        quotes.len(),
                        elapsed
                    ),
                    Err(e) => warn!("{}: '{}' failed: {}", request_id, provider_id, e),
                }

                events.emit(QuoteEvent::ProviderCompleted {
                    request_id,
                    provider_id: provider_id.clone(),
                    status: if result.is_ok() {
                        OutcomeStatus::Success
                    } else {
                        OutcomeStatus::Error
                    },
                    quotes: result.as_ref().cloned().unwrap_or_default(),
                    error: result.as_ref().err().map(ToString::to_string),
                });

                (result, elapsed)
            }));
        }

        join_all(tasks)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, (provider_id, provider_name))| match joined {
                Ok((result, elapsed)) => Settled {
                    provider_id,
                    provider_name,
                    result,
                    elapsed,
                },
                Err(join_error) => {
                    warn!("Provider task for '{}' failed: {}", provider_id, join_error);
                    Settled {
                        result: Err(QuoteEngineError::TaskFailed {
                            provider: provider_id.clone(),
                            message: join_error.to_string(),
                        }),
                        provider_id,
                        provider_name,
                        elapsed: Duration::ZERO,
                    }
                }
            })
            .collect()
    }

    fn merge(&self, request_id: String, settled: Vec<Settled>) -> AggregationResult {
        let mut quotes = Vec::new();
        let mut outcomes = Vec::with_capacity(settled.len());
        let mut summary = ProviderSummary {
            total: settled.len(),
            ..Default::default()
        };

        for entry in settled {
            let duration_ms = entry.elapsed.as_millis() as u64;
            match entry.result {
                Ok(provider_quotes) => {
                    summary.successful += 1;
                    outcomes.push(ProviderOutcome {
                        provider_id: entry.provider_id,
                        provider_name: entry.provider_name,
                        status: OutcomeStatus::Success,
                        quote_count: provider_quotes.len(),
                        error: None,
                        duration_ms,
                    });
                    quotes.extend(provider_quotes);
                }
                Err(error) => {
                    summary.failed += 1;
                    summary.errors.push(ProviderError {
                        provider_id: entry.provider_id.clone(),
                        provider_name: entry.provider_name.clone(),
                        error: error.to_string(),
                    });
                    outcomes.push(ProviderOutcome {
                        provider_id: entry.provider_id,
                        provider_name: entry.provider_name,
                        status: OutcomeStatus::Error,
                        quote_count: 0,
                        error: Some(error.to_string()),
                        duration_ms,
                    });
                }
            }
        }

        sort_by_priority_then_premium(&mut quotes);

        AggregationResult {
            quotes,
            providers: summary,
            outcomes,
            request_id,
            cached: false,
        }
    }

    /// Probe every active provider once through its breaker and record the
    /// outcome in the health map.
    pub async fn run_health_checks(&self) {
        let probes = self
            .registry
            .handles()
            .into_iter()
            .filter(|handle| handle.config().active)
            .map(|handle| async move { self.probe_provider(&handle).await });

        join_all(probes).await;
    }

    /// One synthetic request (age 30, zip 10001, $100k, first supported
    /// coverage type) against a single provider.
    pub async fn probe_provider(&self, handle: &ProviderHandle) {
        let config = handle.config();
        let Some(coverage) = config.supported_coverage_types.first().copied() else {
            return;
        };

        let request = QuoteRequest::new(
            coverage.as_str(),
            PROBE_AGE,
            PROBE_ZIP,
            Decimal::from(PROBE_COVERAGE_AMOUNT),
        );
        let call = ProviderCall {
            limiter: handle.limiter(),
            coverage,
            headers: BTreeMap::new(),
            config,
        };
        let client = handle.client();

        let started = Instant::now();
        let result = handle
            .breaker()
            .execute(|| client.fetch_quotes(&request, &call))
            .await;

        match result {
            Ok(_) => {
                let elapsed = started.elapsed();
                debug!("Health probe for '{}' succeeded in {:?}", handle.id(), elapsed);
                self.health.record_success(handle.id(), elapsed);
            }
            Err(e) => {
                warn!("Health probe for '{}' failed: {}", handle.id(), e);
                self.health.record_failure(handle.id(), &e.to_string());
            }
        }
    }

    /// Health for every registered provider.
    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.registry
            .handles()
            .iter()
            .map(|handle| self.health.get(handle.id()))
            .collect()
    }

    pub fn circuit_stats(&self) -> Vec<CircuitStats> {
        self.registry.circuit_stats()
    }

    /// `GET <baseUrl>/health` for one provider, returning the round-trip time.
    pub async fn check_connectivity(&self, provider_id: &str) -> Result<Duration, QuoteEngineError> {
        let handle =
            self.registry
                .get(provider_id)
                .ok_or_else(|| QuoteEngineError::ProviderUnavailable {
                    provider: provider_id.to_string(),
                })?;
        let config = handle.config();
        handle.client().check_connectivity(&config).await
    }
}

/// Attach aggregation tags to a provider's quotes.
fn tag_quotes(
    quotes: Vec<Quote>,
    provider_id: &str,
    effective: &EffectiveProviderConfig,
) -> Vec<Quote> {
    let responded_at = Utc::now();
    quotes
        .into_iter()
        .map(|mut quote| {
            quote.provider_id = provider_id.to_string();
            quote.organization_id = effective.organization_id.clone();
            quote.priority = Some(effective.config.priority);
            quote.commission_rate = effective.commission_rate;
            quote.responded_at = Some(responded_at);
            quote
        })
        .collect()
}

/// Final ordering: effective priority ascending, then monthly premium.
pub fn sort_by_priority_then_premium(quotes: &mut [Quote]) {
    quotes.sort_by(|a, b| {
        a.effective_priority()
            .cmp(&b.effective_priority())
            .then_with(|| a.monthly_premium.cmp(&b.monthly_premium))
    });
}
