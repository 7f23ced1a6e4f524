//! Therapy sessions and their status lifecycle.
//!
//! ```text
//! Scheduled   → Completed | Cancelled | Rescheduled
//! Rescheduled → Scheduled | Completed | Cancelled
//! Completed, Cancelled: terminal
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
}

impl SessionStatus {
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Scheduled, Completed)
                | (Scheduled, Cancelled)
                | (Scheduled, Rescheduled)
                | (Rescheduled, Scheduled)
                | (Rescheduled, Completed)
                | (Rescheduled, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Whether a session in this status still holds its time slot.
    pub fn occupies_slot(self) -> bool {
        self != SessionStatus::Cancelled
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Rescheduled => "rescheduled",
        };
        f.write_str(name)
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" | "canceled" => Ok(SessionStatus::Cancelled),
            "rescheduled" => Ok(SessionStatus::Rescheduled),
            other => Err(DomainError::Invalid {
                field: "status",
                reason: format!("unknown session status '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapySession {
    pub id: String,
    pub therapist_id: String,
    pub client_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// End of a session starting at `start`, or an error if it would fall past
/// the representable range.
pub fn session_end(start: DateTime<Utc>, duration_minutes: u32) -> Result<DateTime<Utc>, DomainError> {
    start
        .checked_add_signed(Duration::minutes(i64::from(duration_minutes)))
        .ok_or_else(|| DomainError::Invalid {
            field: "scheduled_at",
            reason: "session ends past the supported date range".into(),
        })
}

impl TherapySession {
    /// Saturates at the latest representable time.
    pub fn ends_at(&self) -> DateTime<Utc> {
        session_end(self.scheduled_at, self.duration_minutes).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Half-open interval overlap: back-to-back sessions do not conflict.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_at < end && start < self.ends_at()
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
