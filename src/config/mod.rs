//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → handed to Governor / transport / analytics at construction
//! ```
//!
//! Every field has a default so an empty file is a valid config.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AnalyticsConfig, ApiConfig, AuthConfig, CacheConfig, CircuitBreakerConfig, ClientConfig,
    ObservabilityConfig, RateLimitConfig, RetryConfig,
};
pub use validation::ValidationError;
