/// Classification for retry policy.
///
/// Used by the provider client to decide whether a failed attempt is worth
/// repeating inside the provider's own retry budget.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Counts as breaker failure? |
/// |-------|----------------------|----------------------------|
/// | `Never` | No | Yes |
/// | `WithBackoff` | Yes, `initialDelay * multiplier^attempt` | Yes, once retries are exhausted |
/// | `CircuitOpen` | No | No (the call never ran) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - the request is invalid for this provider or the
    /// response can't be understood. Retrying won't help.
    Never,

    /// Transient failure (timeout, connection failure, 408/429/5xx).
    /// Retried with exponential backoff until the provider's `maxRetries`
    /// budget is spent.
    WithBackoff,

    /// Circuit breaker is open for this provider.
    /// Fails fast and is never retried.
    CircuitOpen,
}
