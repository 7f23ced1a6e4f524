//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! governor / analytics / api
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stderr (fmt layer, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! Without an installed recorder the metric calls are no-ops.

pub mod logging;
pub mod metrics;
