//! Per-endpoint circuit breaker.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: one trial request tests for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: cooldown elapsed since the last failure
//! Half-Open → Closed: trial request succeeds
//! Half-Open → Open: trial request fails (cooldown restarts)
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Past this many endpoints, idle closed breakers are dropped.
const MAX_TRACKED_ENDPOINTS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// How a request was let through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed.
    Normal,
    /// The single trial allowed while half-open.
    Trial,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_started: Option<Instant>,
}

/// Circuit breaker guarding one endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: String,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            failure_threshold,
            cooldown,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_started: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Decide whether a request may go out.
    ///
    /// Returns the remaining wait on rejection. While half-open only one
    /// trial is outstanding; a trial that never reports back is abandoned
    /// after one more cooldown so the breaker cannot wedge.
    pub fn try_acquire(&self, now: Instant) -> Result<Admission, Duration> {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = s
                    .last_failure
                    .map(|at| now.duration_since(at))
                    .unwrap_or(self.cooldown);
                if elapsed < self.cooldown {
                    return Err(self.cooldown - elapsed);
                }
                s.state = CircuitState::HalfOpen;
                s.trial_started = Some(now);
                drop(s);

                tracing::info!(endpoint = %self.endpoint, "Circuit half-open, allowing trial request");
                metrics::record_circuit_transition(&self.endpoint, CircuitState::HalfOpen);
                Ok(Admission::Trial)
            }
            CircuitState::HalfOpen => match s.trial_started {
                Some(started) if now.duration_since(started) < self.cooldown => {
                    Err(self.cooldown - now.duration_since(started))
                }
                _ => {
                    s.trial_started = Some(now);
                    Ok(Admission::Trial)
                }
            },
        }
    }

    /// Give back a trial slot that did not reach the network.
    pub fn release_trial(&self) {
        let mut s = self.lock();
        if s.state == CircuitState::HalfOpen {
            s.trial_started = None;
        }
    }

    /// The endpoint answered; close the circuit and reset the count.
    pub fn record_success(&self) {
        let mut s = self.lock();
        s.failure_count = 0;
        s.trial_started = None;
        if s.state == CircuitState::Closed {
            return;
        }
        let previous = s.state;
        s.state = CircuitState::Closed;
        drop(s);

        tracing::info!(endpoint = %self.endpoint, from = %previous, "Circuit closed");
        metrics::record_circuit_transition(&self.endpoint, CircuitState::Closed);
    }

    /// Count a failure; returns true if this call opened the circuit.
    pub fn record_failure(&self, now: Instant) -> bool {
        let mut s = self.lock();
        s.failure_count = s.failure_count.saturating_add(1);
        s.last_failure = Some(now);
        s.trial_started = None;

        let opens = match s.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => s.failure_count >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if !opens {
            return false;
        }
        s.state = CircuitState::Open;
        let failures = s.failure_count;
        drop(s);

        tracing::warn!(
            endpoint = %self.endpoint,
            failures,
            cooldown_secs = self.cooldown.as_secs(),
            "Circuit opened"
        );
        metrics::record_circuit_transition(&self.endpoint, CircuitState::Open);
        true
    }
}

/// Lazily created breakers, one per endpoint path.
#[derive(Debug)]
pub struct CircuitBreakers {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreakers {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold: config.failure_threshold,
            cooldown: config.cooldown(),
        }
    }

    pub fn get(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return existing.clone();
        }
        if self.breakers.len() > MAX_TRACKED_ENDPOINTS {
            self.prune();
        }
        self.breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    endpoint,
                    self.failure_threshold,
                    self.cooldown,
                ))
            })
            .clone()
    }

    /// State of an endpoint's breaker; endpoints never called are closed.
    pub fn state(&self, endpoint: &str) -> CircuitState {
        self.breakers
            .get(endpoint)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    pub fn failure_count(&self, endpoint: &str) -> u32 {
        self.breakers
            .get(endpoint)
            .map(|b| b.failure_count())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Drop breakers that are closed, have no failures and are not in use.
    /// Such a breaker is indistinguishable from a freshly created one.
    fn prune(&self) {
        self.breakers.retain(|_, breaker| {
            Arc::strong_count(breaker) > 1
                || breaker.state() != CircuitState::Closed
                || breaker.failure_count() > 0
        });
    }

    pub fn reset(&self) {
        self.breakers.clear();
    }
}
