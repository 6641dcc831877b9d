//! Per-provider circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern to keep a failing provider from
//! slowing down every aggregation. The circuit has three states:
//!
//! - **Closed**: Normal operation, calls are allowed through.
//! - **Open**: Provider is failing, calls fail fast without running.
//! - **HalfOpen**: Recovery timeout elapsed; the next call probes the provider.
//!
//! The circuit breaker is in-memory and resets on process restart.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::errors::QuoteEngineError;

/// Default number of failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum CircuitState {
    /// Normal operation - calls are allowed.
    Closed,
    /// Provider is failing - calls are rejected.
    Open,
    /// Testing recovery - the next outcome decides.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// Failures since the last success.
    failure_count: u32,
    /// Lifetime successes.
    success_count: u64,
    /// Monotonic time of the last failure, drives the recovery timer.
    last_failure: Option<Instant>,
    /// Wall-clock time of the last failure, for reporting.
    last_failure_at: Option<DateTime<Utc>>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_at: None,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait after the last failure before probing again.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

/// Snapshot of a circuit, exposed for health endpoints.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub provider: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Circuit breaker guarding a single provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    circuit: Mutex<Circuit>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a circuit breaker with default settings.
    pub fn new(provider: impl Into<String>) -> Self {
        Self::with_config(provider, CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(provider: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            circuit: Mutex::new(Circuit::new()),
            config,
        }
    }

    /// Lock the circuit, recovering from poison if necessary.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Circuit breaker mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    /// Run one attempt of `operation` through the breaker.
    ///
    /// While Open (and before the recovery timeout has elapsed) the operation
    /// is not invoked and [`QuoteEngineError::CircuitOpen`] is returned.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, QuoteEngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QuoteEngineError>>,
    {
        if !self.is_allowed() {
            return Err(QuoteEngineError::CircuitOpen {
                provider: self.provider.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(error)
            }
        }
    }

    /// Check if calls are allowed.
    ///
    /// Also performs the lazy Open -> HalfOpen transition once
    /// `recovery_timeout` has passed since the last failure.
    pub fn is_allowed(&self) -> bool {
        let mut circuit = self.lock_circuit();

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = circuit
                    .last_failure
                    .is_some_and(|at| at.elapsed() > self.config.recovery_timeout);
                if recovered {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        self.provider
                    );
                    circuit.state = CircuitState::HalfOpen;
                }
                recovered
            }
        }
    }

    /// Record a successful call.
    ///
    /// Resets the failure count; a success while HalfOpen closes the circuit.
    pub fn record_success(&self) {
        let mut circuit = self.lock_circuit();

        circuit.failure_count = 0;
        circuit.success_count += 1;

        match circuit.state {
            CircuitState::HalfOpen => {
                info!(
                    "Circuit breaker: closing circuit for '{}' after successful probe",
                    self.provider
                );
                circuit.state = CircuitState::Closed;
            }
            CircuitState::Closed => {
                debug!(
                    "Circuit breaker: success for '{}', failure count reset",
                    self.provider
                );
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: unexpected success for '{}' in Open state",
                    self.provider
                );
            }
        }
    }

    /// Record a failed call.
    ///
    /// Opens the circuit at the threshold. Any failure in HalfOpen reopens it.
    pub fn record_failure(&self) {
        let mut circuit = self.lock_circuit();

        circuit.failure_count += 1;
        circuit.last_failure = Some(Instant::now());
        circuit.last_failure_at = Some(Utc::now());

        match circuit.state {
            CircuitState::Closed => {
                if circuit.failure_count >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        self.provider, circuit.failure_count
                    );
                    circuit.state = CircuitState::Open;
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        self.provider, circuit.failure_count, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failure in HalfOpen",
                    self.provider
                );
                circuit.state = CircuitState::Open;
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: additional failure for '{}' (already open)",
                    self.provider
                );
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock_circuit().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_circuit().failure_count
    }

    /// Force the circuit back to Closed.
    pub fn reset(&self) {
        let mut circuit = self.lock_circuit();
        info!(
            "Circuit breaker: manually resetting circuit for '{}'",
            self.provider
        );
        circuit.state = CircuitState::Closed;
        circuit.failure_count = 0;
        circuit.last_failure = None;
        circuit.last_failure_at = None;
    }

    pub fn stats(&self) -> CircuitStats {
        let circuit = self.lock_circuit();
        CircuitStats {
            provider: self.provider.clone(),
            state: circuit.state,
            failure_count: circuit.failure_count,
            success_count: circuit.success_count,
            last_failure_time: circuit.last_failure_at,
        }
    }
}
