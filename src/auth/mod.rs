//! Authentication state: the bearer tokens attached to governed requests.
//!
//! A `401` from any endpoint clears the store; the typed API writes to it
//! after sign-in, sign-up and refresh.

pub mod tokens;

pub use tokens::{AuthTokens, FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
