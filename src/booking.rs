//! In-process booking ledger.
//!
//! Conflict check and insert happen under one lock, so two concurrent
//! bookings for the same therapist slot cannot both succeed. Subscription
//! quotas are checked under the same lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::session::session_end;
use crate::domain::{DomainError, SessionStatus, TherapySession};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookingError {
    #[error("therapist {therapist_id} is already booked at {}", .existing.scheduled_at)]
    Conflict {
        therapist_id: String,
        existing: Box<TherapySession>,
    },

    #[error("client {client_id} has used all {limit} sessions in their subscription")]
    QuotaExceeded { client_id: String, limit: u32 },

    #[error("session {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub therapist_id: String,
    pub client_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
struct Ledger {
    /// therapist id → sessions, in booking order
    by_therapist: HashMap<String, Vec<TherapySession>>,
    /// client id → maximum non-cancelled sessions
    quotas: HashMap<String, u32>,
}

impl Ledger {
    fn find_mut(&mut self, session_id: &str) -> Option<&mut TherapySession> {
        self.by_therapist
            .values_mut()
            .flat_map(|sessions| sessions.iter_mut())
            .find(|s| s.id == session_id)
    }

    fn conflict(
        &self,
        therapist_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ignore: Option<&str>,
    ) -> Option<&TherapySession> {
        self.by_therapist.get(therapist_id)?.iter().find(|s| {
            s.status.occupies_slot()
                && Some(s.id.as_str()) != ignore
                && s.overlaps(start, end)
        })
    }

    fn active_for_client(&self, client_id: &str) -> u32 {
        self.by_therapist
            .values()
            .flatten()
            .filter(|s| s.client_id == client_id && s.status.occupies_slot())
            .count() as u32
    }
}

#[derive(Debug, Default)]
pub struct BookingLedger {
    inner: Mutex<Ledger>,
}

impl BookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cap the number of non-cancelled sessions a client may hold.
    pub fn set_quota(&self, client_id: &str, max_sessions: u32) {
        self.lock().quotas.insert(client_id.to_string(), max_sessions);
    }

    pub fn book(&self, request: BookingRequest) -> Result<TherapySession, BookingError> {
        if request.duration_minutes == 0 {
            return Err(DomainError::Invalid {
                field: "duration_minutes",
                reason: "must be > 0".into(),
            }
            .into());
        }
        let end = session_end(request.scheduled_at, request.duration_minutes)?;

        let mut ledger = self.lock();

        if let Some(existing) = ledger.conflict(&request.therapist_id, request.scheduled_at, end, None) {
            tracing::debug!(
                therapist_id = %request.therapist_id,
                existing = %existing.id,
                "Slot conflict"
            );
            return Err(BookingError::Conflict {
                therapist_id: request.therapist_id,
                existing: Box::new(existing.clone()),
            });
        }

        if let Some(&limit) = ledger.quotas.get(&request.client_id) {
            if ledger.active_for_client(&request.client_id) >= limit {
                return Err(BookingError::QuotaExceeded {
                    client_id: request.client_id,
                    limit,
                });
            }
        }

        let session = TherapySession {
            id: Uuid::new_v4().to_string(),
            therapist_id: request.therapist_id,
            client_id: request.client_id,
            scheduled_at: request.scheduled_at,
            duration_minutes: request.duration_minutes,
            status: SessionStatus::Scheduled,
            notes: request.notes,
        };
        ledger
            .by_therapist
            .entry(session.therapist_id.clone())
            .or_default()
            .push(session.clone());

        tracing::info!(session_id = %session.id, therapist_id = %session.therapist_id, "Session booked");
        Ok(session)
    }

    /// Move a session to a new start time, keeping its duration.
    pub fn reschedule(
        &self,
        session_id: &str,
        new_start: DateTime<Utc>,
    ) -> Result<TherapySession, BookingError> {
        let mut ledger = self.lock();

        let (therapist_id, duration) = {
            let session = ledger
                .find_mut(session_id)
                .ok_or_else(|| BookingError::NotFound(session_id.to_string()))?;
            if session.status.is_terminal() {
                return Err(DomainError::IllegalTransition {
                    from: session.status,
                    to: SessionStatus::Rescheduled,
                }
                .into());
            }
            (session.therapist_id.clone(), session.duration_minutes)
        };

        let end = session_end(new_start, duration)?;
        if let Some(existing) = ledger.conflict(&therapist_id, new_start, end, Some(session_id)) {
            return Err(BookingError::Conflict {
                therapist_id,
                existing: Box::new(existing.clone()),
            });
        }

        let session = ledger
            .find_mut(session_id)
            .ok_or_else(|| BookingError::NotFound(session_id.to_string()))?;
        if session.status != SessionStatus::Rescheduled {
            session.transition(SessionStatus::Rescheduled)?;
        }
        session.scheduled_at = new_start;
        Ok(session.clone())
    }

    pub fn cancel(&self, session_id: &str) -> Result<TherapySession, BookingError> {
        self.transition(session_id, SessionStatus::Cancelled)
    }

    pub fn complete(&self, session_id: &str) -> Result<TherapySession, BookingError> {
        self.transition(session_id, SessionStatus::Completed)
    }

    fn transition(
        &self,
        session_id: &str,
        next: SessionStatus,
    ) -> Result<TherapySession, BookingError> {
        let mut ledger = self.lock();
        let session = ledger
            .find_mut(session_id)
            .ok_or_else(|| BookingError::NotFound(session_id.to_string()))?;
        session.transition(next)?;
        Ok(session.clone())
    }

    /// Sessions booked with a therapist, ordered by start time.
    pub fn sessions_for(&self, therapist_id: &str) -> Vec<TherapySession> {
        let mut sessions = self
            .lock()
            .by_therapist
            .get(therapist_id)
            .cloned()
            .unwrap_or_default();
        sessions.sort_by_key(|s| s.scheduled_at);
        sessions
    }
}
