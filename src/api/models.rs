//! Request and response bodies for the backend API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthTokens;
use crate::domain::{DomainError, Profile, Role, SessionStatus};

#[derive(Debug, Clone, Serialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body returned by sign-up, sign-in and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub user: Profile,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSession {
    pub therapist_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusUpdate {
    pub status: SessionStatus,
}

const PASSWORD_MIN: usize = 8;
const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;

fn invalid(field: &'static str, reason: impl Into<String>) -> DomainError {
    DomainError::Invalid {
        field,
        reason: reason.into(),
    }
}

pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(invalid("email", "must contain exactly one '@'")),
    };
    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(invalid("email", "malformed address"));
    }
    let labels_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
    if !labels_ok {
        return Err(invalid("email", "malformed domain"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(invalid(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    let len = name.trim().chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(invalid(
            "full_name",
            format!("must be {}-{} characters", NAME_MIN, NAME_MAX),
        ));
    }
    Ok(())
}

impl SignUp {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_name(&self.full_name)
    }
}

impl SignIn {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(invalid("password", "is required"));
        }
        Ok(())
    }
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.full_name {
            validate_name(name)?;
        }
        Ok(())
    }
}

impl NewSession {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.therapist_id.trim().is_empty() {
            return Err(invalid("therapist_id", "is required"));
        }
        if self.duration_minutes == 0 {
            return Err(invalid("duration_minutes", "must be > 0"));
        }
        Ok(())
    }
}
