//! Retry decisions.
//!
//! Only bare network failures are retried. HTTP errors, rate limiting and an
//! open circuit surface immediately, and no retry is scheduled once the
//! endpoint's breaker has opened.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::GovernorError;
use crate::resilience::backoff::Backoff;
use crate::resilience::circuit_breaker::CircuitState;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Backoff::from_config(config))
    }

    /// Delay before the next attempt, or `None` if the error must surface.
    ///
    /// `retries_done` counts retries already performed for this request.
    pub fn next_delay(
        &self,
        error: &GovernorError,
        retries_done: u32,
        circuit: CircuitState,
    ) -> Option<Duration> {
        if !error.is_retryable() || retries_done >= self.max_retries {
            return None;
        }
        if circuit == CircuitState::Open {
            return None;
        }
        Some(self.backoff.delay(retries_done + 1))
    }
}
