//! Lifecycle management.
//!
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl+C or explicit trigger → broadcast → background tasks drain and exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
