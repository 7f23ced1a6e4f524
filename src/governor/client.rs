//! The governed request path.
//!
//! ```text
//! request(endpoint, method, body)
//!     → GET: cache        (fresh → cached body)
//!     → GET: pending      (in flight → await the same future)
//!     → circuit breaker   (Open → CircuitOpen, no network)
//!     → rate limiter      (window full → RateLimited, no network)
//!     → transport.send    (network failure → backoff + retry while closed)
//!     → 2xx: breaker success, cache GET / invalidate on writes
//!     → 401: breaker failure, clear tokens → AuthRequired
//!     → 4xx/5xx: breaker failure, Http { status, message, details }
//! ```

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::TokenStore;
use crate::config::ClientConfig;
use crate::error::{GovernorError, Result};
use crate::governor::cache::ResponseCache;
use crate::observability::metrics;
use crate::resilience::{
    Admission, CircuitBreaker, CircuitBreakers, CircuitState, RetryPolicy, SlidingWindowLimiter,
};
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

type SharedResponse = Shared<BoxFuture<'static, Result<Value>>>;

/// Outbound request governor.
///
/// Owns all per-endpoint state (cache, in-flight GETs, rate windows,
/// breakers). Clones share that state; separate `Governor::new` calls do not.
#[derive(Clone)]
pub struct Governor {
    inner: Arc<GovernorInner>,
}

struct GovernorInner {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    cache: Option<ResponseCache>,
    pending: DashMap<String, SharedResponse>,
    limiter: Option<SlidingWindowLimiter>,
    breakers: CircuitBreakers,
    retry: RetryPolicy,
}

impl Governor {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::new(config.cache.ttl()));
        let limiter = config
            .rate_limit
            .enabled
            .then(|| SlidingWindowLimiter::from_config(&config.rate_limit));

        Self {
            inner: Arc::new(GovernorInner {
                transport,
                tokens,
                cache,
                pending: DashMap::new(),
                limiter,
                breakers: CircuitBreakers::new(&config.circuit_breaker),
                retry: RetryPolicy::from_config(&config.retries),
            }),
        }
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// Send a governed request and return the JSON body on success.
    pub async fn request(&self, endpoint: &str, method: Method, body: Option<Value>) -> Result<Value> {
        let started = Instant::now();
        let endpoint = normalize_endpoint(endpoint)?;
        let result = self.dispatch(&endpoint, method.clone(), body).await;

        metrics::record_request(&endpoint, method.as_str(), outcome_label(&result), started);
        result
    }

    async fn dispatch(&self, endpoint: &str, method: Method, body: Option<Value>) -> Result<Value> {
        let inner = &self.inner;

        if method != Method::GET {
            inner.admit(endpoint)?;
            return inner.clone().execute(endpoint.to_string(), method, body).await;
        }

        if let Some(cached) = inner.cached(endpoint) {
            return Ok(cached);
        }

        let shared = match inner.pending.entry(endpoint.to_string()) {
            Entry::Occupied(existing) => {
                tracing::debug!(endpoint, "Joining in-flight request");
                metrics::record_dedup_join(endpoint);
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                // The previous fetch may have landed between the cache miss and here.
                if let Some(cached) = inner.cached(endpoint) {
                    return Ok(cached);
                }
                inner.admit(endpoint)?;

                let owner = inner.clone();
                let key = endpoint.to_string();
                let fut = async move {
                    let result = owner.clone().execute(key.clone(), Method::GET, None).await;
                    owner.pending.remove(&key);
                    result
                }
                .boxed()
                .shared();
                slot.insert(fut.clone());
                fut
            }
        };

        shared.await
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        self.request(endpoint, Method::GET, None).await
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value> {
        self.request(endpoint, Method::POST, Some(body)).await
    }

    pub async fn patch(&self, endpoint: &str, body: Value) -> Result<Value> {
        self.request(endpoint, Method::PATCH, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.request(endpoint, Method::DELETE, None).await
    }

    /// GET and decode into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let value = self.get(endpoint).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send `body` with `method` and decode the response into `T`.
    pub async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)
            .map_err(|e| GovernorError::InvalidRequest(format!("unencodable body: {}", e)))?;
        let value = self.request(endpoint, method, Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn circuit_state(&self, endpoint: &str) -> CircuitState {
        self.inner.breakers.state(endpoint)
    }

    pub fn failure_count(&self, endpoint: &str) -> u32 {
        self.inner.breakers.failure_count(endpoint)
    }

    /// Drop the cached GET for `endpoint`.
    pub fn invalidate(&self, endpoint: &str) -> bool {
        self.inner
            .cache
            .as_ref()
            .map(|c| c.invalidate(endpoint))
            .unwrap_or(false)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.clear();
        }
    }

    /// Forget all cached responses, rate windows and breaker state.
    pub fn reset(&self) {
        self.clear_cache();
        if let Some(limiter) = &self.inner.limiter {
            limiter.reset();
        }
        self.inner.breakers.reset();
    }
}

impl GovernorInner {
    fn cached(&self, endpoint: &str) -> Option<Value> {
        let cached = self.cache.as_ref()?.get(endpoint, Instant::now())?;
        tracing::debug!(endpoint, "Cache hit");
        metrics::record_cache_hit(endpoint);
        Some(cached)
    }

    /// Admit one network call: the breaker first, then the rate window.
    fn admit(&self, endpoint: &str) -> Result<()> {
        let breaker = self.breakers.get(endpoint);

        let admission = match breaker.try_acquire(Instant::now()) {
            Ok(admission) => admission,
            Err(remaining) => {
                tracing::debug!(endpoint, remaining = ?remaining, "Circuit open, failing fast");
                return Err(GovernorError::CircuitOpen {
                    endpoint: endpoint.to_string(),
                });
            }
        };

        if let Some(limiter) = &self.limiter {
            if let Err(retry_after) = limiter.check(endpoint, Instant::now()) {
                if admission == Admission::Trial {
                    breaker.release_trial();
                }
                tracing::warn!(endpoint, retry_after = ?retry_after, "Rate limit exceeded");
                metrics::record_rate_limited(endpoint);
                return Err(GovernorError::RateLimited {
                    endpoint: endpoint.to_string(),
                    retry_after,
                });
            }
        }
        Ok(())
    }

    /// Perform the network call with retries and record the outcome.
    async fn execute(self: Arc<Self>, endpoint: String, method: Method, body: Option<Value>) -> Result<Value> {
        let breaker = self.breakers.get(&endpoint);
        let mut retries = 0;

        loop {
            let request = ApiRequest {
                method: method.clone(),
                path: endpoint.clone(),
                body: body.clone(),
                bearer: self.tokens.load().map(|t| t.access_token),
                request_id: Uuid::new_v4(),
            };
            let request_id = request.request_id;
            // Writes that land while this GET is in flight make its body stale.
            let generation = self.cache.as_ref().map(|c| c.generation());

            let err = match self.transport.send(request).await {
                Ok(response) => {
                    return self.complete(&breaker, &endpoint, &method, generation, response)
                }
                Err(TransportError::InvalidEndpoint(msg)) => {
                    breaker.release_trial();
                    return Err(GovernorError::InvalidRequest(msg));
                }
                Err(e) => {
                    breaker.record_failure(Instant::now());
                    GovernorError::Network(e.to_string())
                }
            };

            match self.retry.next_delay(&err, retries, breaker.state()) {
                Some(delay) => {
                    retries += 1;
                    tracing::info!(
                        request_id = %request_id,
                        endpoint = %endpoint,
                        attempt = retries,
                        delay = ?delay,
                        error = %err,
                        "Retrying after network error"
                    );
                    metrics::record_retry(&endpoint);
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::warn!(
                        request_id = %request_id,
                        endpoint = %endpoint,
                        retries,
                        circuit = %breaker.state(),
                        error = %err,
                        "Request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    fn complete(
        &self,
        breaker: &CircuitBreaker,
        endpoint: &str,
        method: &Method,
        generation: Option<u64>,
        response: ApiResponse,
    ) -> Result<Value> {
        let status = response.status;

        if !status.is_success() {
            breaker.record_failure(Instant::now());

            if status == StatusCode::UNAUTHORIZED {
                if let Err(e) = self.tokens.clear() {
                    tracing::error!(error = %e, "Failed to clear stored tokens");
                }
                if let Some(cache) = &self.cache {
                    cache.clear();
                }
                tracing::warn!(endpoint, "Authentication required, tokens cleared");
                return Err(GovernorError::AuthRequired);
            }

            tracing::warn!(endpoint, status = %status, "Request rejected");
            return Err(GovernorError::from_response(status, &response.body));
        }

        breaker.record_success();

        if let Some(cache) = &self.cache {
            if *method != Method::GET {
                cache.invalidate(endpoint);
            } else if let Some(generation) = generation {
                let stored =
                    cache.insert_if_current(endpoint, response.body.clone(), Instant::now(), generation);
                if !stored {
                    tracing::debug!(endpoint, "Response outdated by a write, not cached");
                }
            }
        }
        Ok(response.body)
    }
}

/// Endpoints are absolute paths; the query string is part of the key.
fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(GovernorError::InvalidRequest("empty endpoint".into()));
    }
    if trimmed.contains("://") {
        return Err(GovernorError::InvalidRequest(format!(
            "endpoint must be a path, got '{}'",
            trimmed
        )));
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{}", trimmed))
    }
}

fn outcome_label(result: &Result<Value>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(GovernorError::Network(_)) => "network",
        Err(GovernorError::RateLimited { .. }) => "rate_limited",
        Err(GovernorError::CircuitOpen { .. }) => "circuit_open",
        Err(GovernorError::AuthRequired) => "auth_required",
        Err(GovernorError::Http { .. }) => "http_error",
        Err(_) => "other",
    }
}
