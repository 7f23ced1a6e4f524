//! Analytics event batching.

pub mod batcher;

pub use batcher::{AnalyticsBatcher, AnalyticsEvent};
