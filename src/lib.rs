//! Governed API client for the care marketplace backend.
//!
//! # Architecture Overview
//!
//! ```text
//!   CareClient (api)            AnalyticsBatcher (analytics)
//!        │                              │
//!        └──────────────┬───────────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │   Governor    │  circuit breaker → rate limit
//!               │  (governor)   │  → cache → in-flight dedup
//!               └───────┬───────┘  → retry with backoff
//!                       ▼
//!               ┌───────────────┐      ┌──────────────┐
//!               │   Transport   │      │  TokenStore  │
//!               │  (reqwest)    │      │ (auth)       │
//!               └───────────────┘      └──────────────┘
//! ```
//!
//! `BookingLedger` is the in-process, race-free counterpart of the
//! backend's booking check.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod booking;
pub mod config;
pub mod domain;
pub mod error;
pub mod governor;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use api::CareClient;
pub use config::ClientConfig;
pub use error::{GovernorError, Result};
pub use governor::Governor;
pub use lifecycle::Shutdown;
