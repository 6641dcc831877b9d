use std::sync::Arc;

use anyhow::Context;
use covermesh_quote_engine::catalog::{apply_env_api_keys, build_registry, load_catalog};
use covermesh_quote_engine::{
    CircuitBreakerConfig, InMemoryOverrideStore, InMemoryQuoteStore, OverrideStore,
    ProviderConfig, QuoteOrchestrator, QuoteStore,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::events::EventBus;

const EVENT_BUS_CAPACITY: usize = 256;

pub struct AppState {
    pub orchestrator: Arc<QuoteOrchestrator>,
    pub overrides: Arc<dyn OverrideStore>,
    pub quote_store: Arc<dyn QuoteStore>,
    pub event_bus: EventBus,
}

pub fn init_tracing() {
    let log_format = std::env::var("COVERMESH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Loads the provider catalog named by `config`, injects API keys from the
/// environment and builds the state around it.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let mut catalog = load_catalog(config.providers_file.as_deref())
        .context("Failed to load provider catalog")?;
    apply_env_api_keys(&mut catalog);
    build_state_from_catalog(config, catalog)
}

pub fn build_state_from_catalog(
    config: &Config,
    catalog: Vec<ProviderConfig>,
) -> anyhow::Result<Arc<AppState>> {
    let registry = build_registry(catalog, CircuitBreakerConfig::default())
        .context("Invalid provider configuration")?;
    tracing::info!("{} provider(s) registered", registry.len());

    let overrides: Arc<dyn OverrideStore> = Arc::new(InMemoryOverrideStore::new());
    let quote_store: Arc<dyn QuoteStore> = Arc::new(InMemoryQuoteStore::with_limits(
        config.quote_store_ttl,
        config.quote_store_max_sets,
    ));
    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

    if config.cache.enabled {
        tracing::info!("Response cache enabled (ttl {:?})", config.cache.ttl);
    }

    let orchestrator = QuoteOrchestrator::new(Arc::new(registry))
        .with_override_store(Arc::clone(&overrides))
        .with_quote_store(Arc::clone(&quote_store))
        .with_event_sink(Arc::new(event_bus.clone()))
        .with_cache(&config.cache);

    Ok(Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        overrides,
        quote_store,
        event_bus,
    }))
}
