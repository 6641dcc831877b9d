use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use covermesh_quote_engine::{
    CacheSettings, DEFAULT_HEALTH_INTERVAL, DEFAULT_STORE_MAX_SETS, DEFAULT_STORE_TTL,
};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8088";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub struct Config {
    pub listen_addr: SocketAddr,
    /// JSON provider catalog; the built-in catalog when unset.
    pub providers_file: Option<PathBuf>,
    pub health_interval: Duration,
    pub cache: CacheSettings,
    pub cors_allow: Vec<String>,
    /// Applies to the admin routes only. Quote aggregation is bounded by the
    /// per-provider timeouts so partial results always come back.
    pub request_timeout: Duration,
    pub quote_store_ttl: Duration,
    pub quote_store_max_sets: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8088)),
            providers_file: None,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            cache: CacheSettings::default(),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            quote_store_ttl: DEFAULT_STORE_TTL,
            quote_store_max_sets: DEFAULT_STORE_MAX_SETS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let listen_addr: SocketAddr = std::env::var("COVERMESH_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("Invalid COVERMESH_LISTEN_ADDR")?;
        let providers_file = std::env::var("COVERMESH_PROVIDERS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let health_interval = Duration::from_secs(env_parse(
            "COVERMESH_HEALTH_INTERVAL_SECS",
            defaults.health_interval.as_secs(),
        ));
        let cache = CacheSettings {
            enabled: env_parse("COVERMESH_CACHE_ENABLED", defaults.cache.enabled),
            ttl: Duration::from_secs(env_parse(
                "COVERMESH_CACHE_TTL_SECS",
                defaults.cache.ttl.as_secs(),
            )),
            ..defaults.cache
        };
        let cors_allow = std::env::var("COVERMESH_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let request_timeout = Duration::from_millis(env_parse(
            "COVERMESH_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        ));
        let quote_store_ttl = Duration::from_secs(env_parse(
            "COVERMESH_QUOTE_STORE_TTL_SECS",
            defaults.quote_store_ttl.as_secs(),
        ));
        let quote_store_max_sets =
            env_parse("COVERMESH_QUOTE_STORE_MAX_SETS", defaults.quote_store_max_sets);

        Ok(Self {
            listen_addr,
            providers_file,
            health_interval,
            cache,
            cors_allow,
            request_timeout,
            quote_store_ttl,
            quote_store_max_sets,
        })
    }
}

/// Parsed env value, or `default` when unset or unparsable.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
