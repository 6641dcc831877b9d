//! Provider catalog loading.
//!
//! The catalog is a JSON array of [`ProviderConfig`] (camelCase). Without a
//! catalog file the built-in five-carrier catalog is used. API keys never
//! live in the catalog; they are read from `COVERMESH_<ID>_API_KEY`.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use reqwest::Client;

use crate::errors::QuoteEngineError;
use crate::models::{AuthScheme, CoverageType, ProviderConfig, RateLimitSettings};
use crate::provider::mapping::{AUTOGUARD, DENTALCARE, HEALTHBRIDGE, HOMESAFE, LIFESHIELD};
use crate::provider::ProviderClient;
use crate::registry::{CircuitBreakerConfig, ProviderRegistry};

const API_KEY_PREFIX: &str = "COVERMESH_";
const API_KEY_SUFFIX: &str = "_API_KEY";

/// Environment variable holding a provider's API key.
///
/// ```
/// use covermesh_quote_engine::catalog::api_key_var;
/// assert_eq!(api_key_var("home-safe"), "COVERMESH_HOME_SAFE_API_KEY");
/// ```
pub fn api_key_var(provider_id: &str) -> String {
    let id: String = provider_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}{}", API_KEY_PREFIX, id, API_KEY_SUFFIX)
}

fn provider(
    id: &str,
    name: &str,
    base_url: &str,
    coverage: Vec<CoverageType>,
    priority: i32,
    rate_limit: RateLimitSettings,
) -> ProviderConfig {
    let mut config = ProviderConfig::new(id, name, base_url, coverage);
    config.priority = priority;
    config.rate_limit = rate_limit;
    config
}

/// Built-in carriers.
pub fn default_catalog() -> Vec<ProviderConfig> {
    use CoverageType::*;

    let mut lifeshield = provider(
        LIFESHIELD,
        "LifeShield Mutual",
        "https://api.lifeshield.example/v2",
        vec![TermLife, WholeLife, Disability],
        1,
        RateLimitSettings {
            requests_per_second: 10.0,
            burst: 20,
        },
    );
    lifeshield.timeout_ms = 15_000;

    let mut healthbridge = provider(
        HEALTHBRIDGE,
        "HealthBridge",
        "https://quotes.healthbridge.example/api",
        vec![Health, Vision],
        2,
        RateLimitSettings {
            requests_per_second: 5.0,
            burst: 10,
        },
    );
    healthbridge.auth = AuthScheme::Bearer;

    let dentalcare = provider(
        DENTALCARE,
        "DentalCare Plus",
        "https://api.dentalcareplus.example/v1",
        vec![Dental, Vision],
        3,
        RateLimitSettings::default(),
    );

    let mut autoguard = provider(
        AUTOGUARD,
        "AutoGuard Insurance",
        "https://rating.autoguard.example/v3",
        vec![Auto, Renters],
        4,
        RateLimitSettings {
            requests_per_second: 2.0,
            burst: 4,
        },
    );
    autoguard.timeout_ms = 8_000;

    let mut homesafe = provider(
        HOMESAFE,
        "HomeSafe Property & Casualty",
        "https://api.homesafe.example",
        vec![Home, Renters, Pet],
        5,
        RateLimitSettings::default(),
    );
    homesafe.auth = AuthScheme::Header {
        name: "X-HomeSafe-Key".to_string(),
    };

    vec![lifeshield, healthbridge, dentalcare, autoguard, homesafe]
}

/// Parses a JSON catalog.
pub fn parse_catalog(json: &str) -> Result<Vec<ProviderConfig>, QuoteEngineError> {
    serde_json::from_str(json).map_err(|e| QuoteEngineError::Config {
        message: format!("invalid provider catalog: {}", e),
    })
}

/// Reads the catalog at `path`, or the built-in one when `path` is `None`.
pub fn load_catalog(path: Option<&Path>) -> Result<Vec<ProviderConfig>, QuoteEngineError> {
    let Some(path) = path else {
        info!("Using built-in provider catalog");
        return Ok(default_catalog());
    };

    let json = std::fs::read_to_string(path).map_err(|e| QuoteEngineError::Config {
        message: format!("failed to read provider catalog {}: {}", path.display(), e),
    })?;
    let configs = parse_catalog(&json)?;
    info!(
        "Loaded {} provider(s) from {}",
        configs.len(),
        path.display()
    );
    Ok(configs)
}

/// Fills in API keys via `lookup` (normally the process environment).
///
/// A live provider without a key is switched to mock mode.
pub fn apply_api_keys<F>(configs: &mut [ProviderConfig], lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for config in configs.iter_mut() {
        let var = api_key_var(&config.id);
        match lookup(&var).filter(|key| !key.trim().is_empty()) {
            Some(key) => config.api_key = Some(key),
            None if !config.mock_mode && config.auth != AuthScheme::None => {
                warn!(
                    "No API key for provider '{}' ({} unset), falling back to mock mode",
                    config.id, var
                );
                config.mock_mode = true;
            }
            None => {}
        }
    }
}

/// [`apply_api_keys`] against the process environment.
pub fn apply_env_api_keys(configs: &mut [ProviderConfig]) {
    apply_api_keys(configs, |var| std::env::var(var).ok());
}

/// Registers one [`ProviderClient`] per config, sharing a connection pool.
pub fn build_registry(
    configs: Vec<ProviderConfig>,
    breaker_config: CircuitBreakerConfig,
) -> Result<ProviderRegistry, QuoteEngineError> {
    let http = Client::builder()
        .user_agent(concat!("covermesh/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| QuoteEngineError::Config {
            message: format!("failed to build HTTP client: {}", e),
        })?;

    let registry = ProviderRegistry::with_breaker_config(breaker_config);
    for config in configs {
        let client = ProviderClient::with_http_client(&config, http.clone());
        registry.register(config, Arc::new(client))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 5);
        for config in &catalog {
            config.validate().unwrap();
        }
        assert!(catalog.iter().any(|c| c.supports(CoverageType::Dental)));
        assert!(catalog.iter().any(|c| c.supports(CoverageType::Pet)));
    }

    #[test]
    fn test_api_key_var() {
        assert_eq!(api_key_var("LIFESHIELD"), "COVERMESH_LIFESHIELD_API_KEY");
        assert_eq!(api_key_var("acme.direct"), "COVERMESH_ACME_DIRECT_API_KEY");
    }

    #[test]
    fn test_missing_key_falls_back_to_mock() {
        let mut catalog = default_catalog();
        let env = HashMap::from([(
            "COVERMESH_LIFESHIELD_API_KEY".to_string(),
            "ls-secret".to_string(),
        )]);

        apply_api_keys(&mut catalog, |var| env.get(var).cloned());

        let lifeshield = catalog.iter().find(|c| c.id == LIFESHIELD).unwrap();
        assert_eq!(lifeshield.api_key.as_deref(), Some("ls-secret"));
        assert!(!lifeshield.mock_mode);

        let homesafe = catalog.iter().find(|c| c.id == HOMESAFE).unwrap();
        assert!(homesafe.api_key.is_none());
        assert!(homesafe.mock_mode);
    }

    #[test]
    fn test_unauthenticated_provider_stays_live() {
        let mut config = ProviderConfig::new("OPENRATE", "OpenRate", "https://openrate.example", vec![CoverageType::Pet]);
        config.auth = AuthScheme::None;
        let mut configs = vec![config];

        apply_api_keys(&mut configs, |_| None);
        assert!(!configs[0].mock_mode);
    }

    #[test]
    fn test_parse_catalog() {
        let json = r#"[
            {
                "id": "PETPAW",
                "name": "PetPaw",
                "baseUrl": "https://api.petpaw.example",
                "auth": { "type": "bearer" },
                "rateLimit": { "requestsPerSecond": 3.0, "burst": 6 },
                "supportedCoverageTypes": ["pet"],
                "priority": 7
            }
        ]"#;

        let configs = parse_catalog(json).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].auth, AuthScheme::Bearer);
        assert_eq!(configs[0].rate_limit.burst, 6);
        assert_eq!(configs[0].timeout_ms, 10_000);
        assert!(configs[0].active);
    }

    #[test]
    fn test_parse_catalog_rejects_garbage() {
        assert!(matches!(
            parse_catalog("{not json"),
            Err(QuoteEngineError::Config { .. })
        ));
    }

    #[test]
    fn test_build_registry_rejects_invalid_config() {
        let mut config = default_catalog().remove(0);
        config.timeout_ms = 0;
        let result = build_registry(vec![config], CircuitBreakerConfig::default());
        assert!(matches!(result, Err(QuoteEngineError::Config { .. })));
    }

    #[test]
    fn test_build_registry() {
        let registry = build_registry(default_catalog(), CircuitBreakerConfig::default()).unwrap();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.handles()[0].id(), LIFESHIELD);
    }
}
