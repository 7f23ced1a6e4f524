//! Typed facade over the governed request path.

use reqwest::Method;
use serde_json::json;

use crate::api::models::{
    AuthSession, NewSession, ProfileUpdate, RefreshRequest, SignIn, SignUp, StatusUpdate,
};
use crate::auth::AuthTokens;
use crate::domain::{Profile, SessionStatus, TherapySession};
use crate::error::{GovernorError, Result};
use crate::governor::Governor;

const SESSIONS: &str = "/sessions";

/// Client for the marketplace backend.
#[derive(Clone)]
pub struct CareClient {
    governor: Governor,
}

impl CareClient {
    pub fn new(governor: Governor) -> Self {
        Self { governor }
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub fn is_signed_in(&self) -> bool {
        self.governor.tokens().load().is_some()
    }

    fn remember(&self, session: &AuthSession) -> Result<()> {
        self.governor.tokens().store(&session.tokens)?;
        Ok(())
    }

    pub async fn sign_up(&self, request: &SignUp) -> Result<AuthSession> {
        request.validate()?;
        let session: AuthSession = self
            .governor
            .send_json("/auth/signup", Method::POST, request)
            .await?;
        self.remember(&session)?;
        tracing::info!(user_id = %session.user.id, role = %session.user.role, "Signed up");
        Ok(session)
    }

    pub async fn sign_in(&self, request: &SignIn) -> Result<AuthSession> {
        request.validate()?;
        let session: AuthSession = self
            .governor
            .send_json("/auth/signin", Method::POST, request)
            .await?;
        // A different user may have been signed in before.
        self.governor.clear_cache();
        self.remember(&session)?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Exchange the stored refresh token for a new token pair.
    pub async fn refresh(&self) -> Result<AuthTokens> {
        let stored = self.governor.tokens().load().ok_or(GovernorError::AuthRequired)?;
        let tokens: AuthTokens = self
            .governor
            .send_json(
                "/auth/refresh",
                Method::POST,
                &RefreshRequest {
                    refresh_token: &stored.refresh_token,
                },
            )
            .await?;
        self.governor.tokens().store(&tokens)?;
        tracing::debug!("Access token refreshed");
        Ok(tokens)
    }

    /// Tell the backend, then forget local credentials regardless of outcome.
    pub async fn sign_out(&self) -> Result<()> {
        if self.is_signed_in() {
            if let Err(e) = self.governor.post("/auth/signout", json!({})).await {
                tracing::warn!(error = %e, "Sign-out request failed, clearing local tokens anyway");
            }
        }
        self.governor.tokens().clear()?;
        self.governor.clear_cache();
        Ok(())
    }

    /// The signed-in user's profile, or another user's by id.
    pub async fn profile(&self, id: Option<&str>) -> Result<Profile> {
        let endpoint = match id {
            Some(id) => format!("/profiles/{}", path_segment(id)?),
            None => "/profiles/me".to_string(),
        };
        self.governor.get_json(&endpoint).await
    }

    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Profile> {
        update.validate()?;
        let endpoint = format!("/profiles/{}", path_segment(id)?);
        let profile: Profile = self
            .governor
            .send_json(&endpoint, Method::PATCH, update)
            .await?;
        self.governor.invalidate("/profiles/me");
        Ok(profile)
    }

    pub async fn sessions(&self) -> Result<Vec<TherapySession>> {
        self.governor.get_json(SESSIONS).await
    }

    pub async fn session(&self, id: &str) -> Result<TherapySession> {
        self.governor
            .get_json(&format!("{}/{}", SESSIONS, path_segment(id)?))
            .await
    }

    /// Book a session. The backend owns conflict detection; a taken slot
    /// comes back as `Http { status: 409, .. }`.
    pub async fn book_session(&self, request: &NewSession) -> Result<TherapySession> {
        request.validate()?;
        let session: TherapySession = self
            .governor
            .send_json(SESSIONS, Method::POST, request)
            .await?;
        tracing::info!(
            session_id = %session.id,
            therapist_id = %session.therapist_id,
            at = %session.scheduled_at,
            "Session booked"
        );
        Ok(session)
    }

    /// Move a session to `next`, validating the transition locally first.
    pub async fn update_session_status(
        &self,
        id: &str,
        next: SessionStatus,
    ) -> Result<TherapySession> {
        let endpoint = format!("{}/{}", SESSIONS, path_segment(id)?);
        self.governor.invalidate(&endpoint);

        let mut current: TherapySession = self.governor.get_json(&endpoint).await?;
        current.transition(next)?;

        let updated: TherapySession = self
            .governor
            .send_json(&endpoint, Method::PATCH, &StatusUpdate { status: next })
            .await?;
        self.governor.invalidate(SESSIONS);
        Ok(updated)
    }

    pub async fn cancel_session(&self, id: &str) -> Result<TherapySession> {
        self.update_session_status(id, SessionStatus::Cancelled).await
    }

    pub async fn complete_session(&self, id: &str) -> Result<TherapySession> {
        self.update_session_status(id, SessionStatus::Completed).await
    }
}

fn path_segment(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(GovernorError::InvalidRequest(format!("invalid id '{}'", id)));
    }
    Ok(id)
}
