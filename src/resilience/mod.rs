//! Resilience primitives used by the request governor.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → circuit_breaker.rs (fail fast while the endpoint is open)
//!     → rate_limit.rs (fail fast past the sliding-window budget)
//!     → network call
//!     → On network failure: retries.rs decides, backoff.rs schedules
//!     → circuit_breaker.rs records the outcome
//! ```
//!
//! All state is keyed by endpoint path and owned by one `Governor`.

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;

pub use backoff::Backoff;
pub use circuit_breaker::{Admission, CircuitBreaker, CircuitBreakers, CircuitState};
pub use rate_limit::SlidingWindowLimiter;
pub use retries::RetryPolicy;
