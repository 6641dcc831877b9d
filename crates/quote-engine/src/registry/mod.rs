//! Provider registry with per-provider resilience.
//!
//! - [`RateLimiter`]: token bucket throttle
//! - [`CircuitBreaker`]: failure isolation with recovery timer
//! - [`ProviderRegistry`]: startup-built map of provider handles

mod circuit_breaker;
mod provider_registry;
mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStats};
pub use provider_registry::{ProviderHandle, ProviderRegistry};
pub use rate_limiter::RateLimiter;
