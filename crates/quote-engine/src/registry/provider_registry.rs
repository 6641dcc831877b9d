//! Provider registry.
//!
//! Built once at startup: every provider id maps to a [`ProviderHandle`]
//! holding its configuration, client, rate limiter and circuit breaker.
//! Organizations that override a provider's rate limit get their own bucket,
//! created on first use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitStats, RateLimiter};
use crate::errors::QuoteEngineError;
use crate::models::{ProviderConfig, RateLimitSettings};
use crate::provider::QuoteProvider;

/// Organization bucket plus the settings it was built from.
type OrgLimiter = (RateLimitSettings, Arc<RateLimiter>);

/// Everything the orchestrator needs to call one provider.
pub struct ProviderHandle {
    id: String,
    config: RwLock<ProviderConfig>,
    client: Arc<dyn QuoteProvider>,
    limiter: RwLock<Arc<RateLimiter>>,
    org_limiters: Mutex<HashMap<String, OrgLimiter>>,
    breaker: CircuitBreaker,
}

impl ProviderHandle {
    fn new(
        config: ProviderConfig,
        client: Arc<dyn QuoteProvider>,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, QuoteEngineError> {
        let limiter = RateLimiter::new(config.id.clone(), config.rate_limit)?;
        Ok(Self {
            id: config.id.clone(),
            breaker: CircuitBreaker::with_config(config.id.clone(), breaker_config),
            config: RwLock::new(config),
            client,
            limiter: RwLock::new(Arc::new(limiter)),
            org_limiters: Mutex::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ProviderConfig {
        self.read_config().clone()
    }

    pub fn client(&self) -> Arc<dyn QuoteProvider> {
        Arc::clone(&self.client)
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The provider-wide bucket.
    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter.read().unwrap_or_else(|poisoned| {
            warn!("Limiter lock for '{}' was poisoned, recovering", self.id);
            poisoned.into_inner()
        }))
    }

    /// Bucket for a call: the organization's own bucket when it overrides
    /// the rate limit, otherwise the provider-wide one.
    ///
    /// Organization buckets are keyed by organization id and rebuilt when the
    /// override settings change. An organization calling without an override
    /// drops its bucket.
    pub fn limiter_for(
        &self,
        organization_id: Option<&str>,
        rate_limit_override: Option<RateLimitSettings>,
    ) -> Result<Arc<RateLimiter>, QuoteEngineError> {
        let Some(organization_id) = organization_id else {
            return Ok(self.limiter());
        };
        let Some(settings) = rate_limit_override else {
            self.release_org_limiter(organization_id);
            return Ok(self.limiter());
        };

        let mut limiters = self.lock_org_limiters();
        if let Some((existing, limiter)) = limiters.get(organization_id) {
            if *existing == settings {
                return Ok(Arc::clone(limiter));
            }
        }

        debug!(
            "Creating rate limiter for provider '{}' and organization '{}'",
            self.id, organization_id
        );
        let limiter = Arc::new(RateLimiter::new(
            format!("{}/{}", self.id, organization_id),
            settings,
        )?);
        limiters.insert(
            organization_id.to_string(),
            (settings, Arc::clone(&limiter)),
        );
        Ok(limiter)
    }

    /// Forget the organization's own bucket, if any.
    pub fn release_org_limiter(&self, organization_id: &str) {
        if self.lock_org_limiters().remove(organization_id).is_some() {
            debug!(
                "Released rate limiter for provider '{}' and organization '{}'",
                self.id, organization_id
            );
        }
    }

    fn read_config(&self) -> RwLockReadGuard<'_, ProviderConfig> {
        self.config.read().unwrap_or_else(|poisoned| {
            warn!("Config lock for '{}' was poisoned, recovering", self.id);
            poisoned.into_inner()
        })
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, ProviderConfig> {
        self.config.write().unwrap_or_else(|poisoned| {
            warn!("Config lock for '{}' was poisoned, recovering", self.id);
            poisoned.into_inner()
        })
    }

    fn lock_org_limiters(&self) -> MutexGuard<'_, HashMap<String, OrgLimiter>> {
        self.org_limiters.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Organization limiter mutex for '{}' was poisoned, recovering",
                self.id
            );
            poisoned.into_inner()
        })
    }
}

/// Registry of configured providers.
pub struct ProviderRegistry {
    handles: RwLock<HashMap<String, Arc<ProviderHandle>>>,
    breaker_config: CircuitBreakerConfig,
}

impl ProviderRegistry {
    /// Create an empty registry with default circuit breaker settings.
    pub fn new() -> Self {
        Self::with_breaker_config(CircuitBreakerConfig::default())
    }

    pub fn with_breaker_config(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            breaker_config,
        }
    }

    fn read_handles(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ProviderHandle>>> {
        self.handles.read().unwrap_or_else(|poisoned| {
            warn!("Provider registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_handles(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ProviderHandle>>> {
        self.handles.write().unwrap_or_else(|poisoned| {
            warn!("Provider registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Validate `config` and register `client` for it.
    ///
    /// Re-registering an id replaces the previous handle, breaker state included.
    pub fn register(
        &self,
        config: ProviderConfig,
        client: Arc<dyn QuoteProvider>,
    ) -> Result<(), QuoteEngineError> {
        config.validate()?;

        info!(
            "Registering provider '{}' ({} req/s, burst {}, priority {}, mock: {})",
            config.id,
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
            config.priority,
            config.mock_mode
        );

        let handle = ProviderHandle::new(config, client, self.breaker_config.clone())?;
        self.write_handles()
            .insert(handle.id.clone(), Arc::new(handle));
        Ok(())
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<ProviderHandle>> {
        self.read_handles().get(provider_id).cloned()
    }

    /// All handles, ordered by priority then id.
    pub fn handles(&self) -> Vec<Arc<ProviderHandle>> {
        let mut handles: Vec<(i32, Arc<ProviderHandle>)> = self
            .read_handles()
            .values()
            .map(|handle| (handle.read_config().priority, Arc::clone(handle)))
            .collect();
        handles.sort_by(|(a_priority, a), (b_priority, b)| {
            a_priority.cmp(b_priority).then_with(|| a.id.cmp(&b.id))
        });
        handles.into_iter().map(|(_, handle)| handle).collect()
    }

    pub fn configs(&self) -> Vec<ProviderConfig> {
        self.handles().iter().map(|handle| handle.config()).collect()
    }

    pub fn len(&self) -> usize {
        self.read_handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_handles().is_empty()
    }

    /// Admin path: validate and swap a provider's configuration.
    ///
    /// The provider-wide limiter is rebuilt when its rate-limit settings change.
    /// The API key is kept when the update does not carry one.
    pub fn update_provider_config(&self, mut config: ProviderConfig) -> Result<(), QuoteEngineError> {
        config.validate()?;

        let handle = self
            .get(&config.id)
            .ok_or_else(|| QuoteEngineError::ProviderUnavailable {
                provider: config.id.clone(),
            })?;

        let mut current = handle.write_config();
        if config.api_key.is_none() {
            config.api_key = current.api_key.clone();
        }

        if current.rate_limit != config.rate_limit {
            let limiter = RateLimiter::new(config.id.clone(), config.rate_limit)?;
            *handle.limiter.write().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                Arc::new(limiter);
            info!(
                "Rebuilt rate limiter for '{}' ({} req/s, burst {})",
                config.id, config.rate_limit.requests_per_second, config.rate_limit.burst
            );
        }

        info!("Updated configuration for provider '{}'", config.id);
        *current = config;
        Ok(())
    }

    pub fn circuit_stats(&self) -> Vec<CircuitStats> {
        self.handles()
            .iter()
            .map(|handle| handle.breaker.stats())
            .collect()
    }

    pub fn reset_circuit(&self, provider_id: &str) -> Result<(), QuoteEngineError> {
        let handle = self
            .get(provider_id)
            .ok_or_else(|| QuoteEngineError::ProviderUnavailable {
                provider: provider_id.to_string(),
            })?;
        handle.breaker.reset();
        Ok(())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoverageType, Quote, QuoteRequest};
    use crate::provider::ProviderCall;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NullProvider(&'static str);

    #[async_trait]
    impl QuoteProvider for NullProvider {
        fn id(&self) -> &str {
            self.0
        }

        async fn fetch_quotes(
            &self,
            _request: &QuoteRequest,
            _call: &ProviderCall,
        ) -> Result<Vec<Quote>, QuoteEngineError> {
            Ok(Vec::new())
        }

        async fn check_connectivity(
            &self,
            _config: &ProviderConfig,
        ) -> Result<Duration, QuoteEngineError> {
            Ok(Duration::ZERO)
        }
    }

    fn config(id: &str, priority: i32) -> ProviderConfig {
        let mut config = ProviderConfig::new(
            id,
            id,
            "https://provider.example",
            vec![CoverageType::Auto],
        );
        config.priority = priority;
        config
    }

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry
            .register(config("AUTOGUARD", 2), Arc::new(NullProvider("AUTOGUARD")))
            .unwrap();
        registry
            .register(config("HOMESAFE", 1), Arc::new(NullProvider("HOMESAFE")))
            .unwrap();
        registry
            .register(config("BUDGETAUTO", 2), Arc::new(NullProvider("BUDGETAUTO")))
            .unwrap();
        registry
    }

    #[test]
    fn test_handles_sorted_by_priority_then_id() {
        let ids: Vec<String> = registry()
            .handles()
            .iter()
            .map(|h| h.id().to_string())
            .collect();
        assert_eq!(ids, vec!["HOMESAFE", "AUTOGUARD", "BUDGETAUTO"]);
    }

    #[test]
    fn test_register_rejects_invalid_config() {
        let registry = ProviderRegistry::new();
        let mut bad = config("BROKEN", 1);
        bad.rate_limit.requests_per_second = 0.0;

        let result = registry.register(bad, Arc::new(NullProvider("BROKEN")));

        assert!(matches!(result, Err(QuoteEngineError::Config { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_rebuilds_limiter_and_keeps_key() {
        let registry = ProviderRegistry::new();
        let mut initial = config("AUTOGUARD", 1);
        initial.api_key = Some("secret".to_string());
        registry
            .register(initial, Arc::new(NullProvider("AUTOGUARD")))
            .unwrap();

        let handle = registry.get("AUTOGUARD").unwrap();
        let before = handle.limiter();

        let mut updated = config("AUTOGUARD", 4);
        updated.rate_limit = RateLimitSettings {
            requests_per_second: 1.0,
            burst: 2,
        };
        registry.update_provider_config(updated).unwrap();

        let after = handle.limiter();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!((after.available_tokens() - 2.0).abs() < 0.01);
        assert_eq!(handle.config().priority, 4);
        assert_eq!(handle.config().api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_update_unknown_provider_fails() {
        let result = registry().update_provider_config(config("UNKNOWN", 1));
        assert!(matches!(
            result,
            Err(QuoteEngineError::ProviderUnavailable { .. })
        ));
    }

    #[test]
    fn test_org_limiter_is_created_lazily_and_reused() {
        let registry = registry();
        let handle = registry.get("AUTOGUARD").unwrap();
        let settings = RateLimitSettings {
            requests_per_second: 1.0,
            burst: 1,
        };

        let shared = handle.limiter_for(Some("org-1"), None).unwrap();
        assert!(Arc::ptr_eq(&shared, &handle.limiter()));

        let first = handle.limiter_for(Some("org-1"), Some(settings)).unwrap();
        let second = handle.limiter_for(Some("org-1"), Some(settings)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &shared));

        let other_org = handle.limiter_for(Some("org-2"), Some(settings)).unwrap();
        assert!(!Arc::ptr_eq(&first, &other_org));

        let changed = handle
            .limiter_for(
                Some("org-1"),
                Some(RateLimitSettings {
                    requests_per_second: 2.0,
                    burst: 3,
                }),
            )
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &changed));
    }

    #[test]
    fn test_org_limiter_released_when_override_goes_away() {
        let registry = registry();
        let handle = registry.get("AUTOGUARD").unwrap();
        let settings = RateLimitSettings {
            requests_per_second: 1.0,
            burst: 1,
        };

        handle.limiter_for(Some("org-1"), Some(settings)).unwrap();
        handle.limiter_for(Some("org-2"), Some(settings)).unwrap();
        assert_eq!(handle.lock_org_limiters().len(), 2);

        handle.limiter_for(Some("org-1"), None).unwrap();
        assert_eq!(handle.lock_org_limiters().len(), 1);

        handle.release_org_limiter("org-2");
        assert!(handle.lock_org_limiters().is_empty());
    }

    #[test]
    fn test_org_limiter_with_vanishing_rate_is_an_error() {
        let registry = registry();
        let handle = registry.get("AUTOGUARD").unwrap();
        let result = handle.limiter_for(
            Some("org-1"),
            Some(RateLimitSettings {
                requests_per_second: 1e-20,
                burst: 1,
            }),
        );

        assert!(matches!(result, Err(QuoteEngineError::Config { .. })));
        assert!(handle.lock_org_limiters().is_empty());
    }

    #[test]
    fn test_circuit_stats_and_reset() {
        let registry = registry();
        let handle = registry.get("HOMESAFE").unwrap();
        for _ in 0..5 {
            handle.breaker().record_failure();
        }

        let stats = registry.circuit_stats();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].provider, "HOMESAFE");
        assert_eq!(stats[0].failure_count, 5);

        registry.reset_circuit("HOMESAFE").unwrap();
        assert_eq!(handle.breaker().failure_count(), 0);
    }
}
