//! # Resilience
//!
//! Shared protection around provider calls:
//!
//! - [`CircuitBreaker`]: per-provider consecutive-failure breaker with cooldown
//! - [`RateLimiter`]: fixed-window request ceilings per provider and per model
//! - [`FallbackOrchestrator`]: walks (model, provider) pairs until one succeeds
//!
//! The breaker and limiter are built once per process and shared as `Arc`s.

pub mod circuit_breaker;
pub mod fallback;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use fallback::{FailedAttempt, FallbackError, FallbackOrchestrator, FallbackOutcome};
pub use rate_limiter::{
    Acquisition, LimitScope, RateLimitOverrides, RateLimitSnapshot, RateLimiter
};
