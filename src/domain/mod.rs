//! Marketplace entities touched by the typed API.

use thiserror::Error;

pub mod profile;
pub mod session;

pub use profile::{Profile, Role};
pub use session::{SessionStatus, TherapySession};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("illegal session transition from {from} to {to}")]
    IllegalTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<DomainError> for crate::error::GovernorError {
    fn from(err: DomainError) -> Self {
        crate::error::GovernorError::InvalidRequest(err.to_string())
    }
}
