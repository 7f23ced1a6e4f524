//! Outbound request governor.
//!
//! Wraps every call to the backend API with caching, in-flight
//! deduplication, sliding-window rate limiting, a per-endpoint circuit
//! breaker and retry with backoff, so a flaky backend is not hammered and
//! callers do not fire duplicate requests.

pub mod cache;
pub mod client;

pub use cache::ResponseCache;
pub use client::Governor;
