//! Token bucket rate limiter for quote providers.
//!
//! Each provider (and each organization with its own rate-limit override)
//! gets one [`RateLimiter`] instance holding a single bucket.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::errors::QuoteEngineError;
use crate::models::RateLimitSettings;

/// Token bucket state.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens, within `[0, capacity]`.
    tokens: f64,
    /// Last time the bucket was refilled.
    last_refill: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    fn new(rate: f64, capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
            rate,
            capacity,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Async token bucket throttle for a single provider.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    bucket: Mutex<TokenBucket>,
    /// Fixed back-off between refill checks: `1 / rate`.
    wait: Duration,
}

impl RateLimiter {
    /// Create a limiter refilling `settings.requests_per_second` tokens per
    /// second up to `settings.burst`.
    ///
    /// Fails for a non-positive rate or a zero burst, either of which would
    /// make [`acquire`](Self::acquire) wait forever.
    pub fn new(name: impl Into<String>, settings: RateLimitSettings) -> Result<Self, QuoteEngineError> {
        settings.validate()?;

        let rate = settings.requests_per_second;
        Ok(Self {
            name: name.into(),
            bucket: Mutex::new(TokenBucket::new(rate, settings.burst as f64)),
            wait: Duration::from_secs_f64(1.0 / rate),
        })
    }

    /// Lock the bucket, recovering from poison if necessary.
    ///
    /// A poisoned bucket only means a slightly wrong token count.
    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter '{}' mutex was poisoned, recovering", self.name);
            poisoned.into_inner()
        })
    }

    /// Wait (asynchronously) until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            if self.lock_bucket().try_acquire() {
                debug!("Rate limiter: acquired token for '{}'", self.name);
                return;
            }

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                self.wait, self.name
            );
            tokio::time::sleep(self.wait).await;
        }
    }

    /// Try to acquire a token without waiting.
    ///
    /// Returns true if a token was acquired, false if rate limited.
    pub fn try_acquire(&self) -> bool {
        self.lock_bucket().try_acquire()
    }

    /// Tokens currently available after refilling.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        bucket.refill();
        bucket.tokens
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
