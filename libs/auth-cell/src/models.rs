use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::auth::UserRole;
use shared_models::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password1: String,
    pub password2: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Row of the `users` table, the clinic-side mirror of the auth user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub role: UserRole,
    pub is_approved: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub redirect_to: String,
    pub message: Option<String>,
}

/// Where each role lands after signing in, plus a warning for roles without a dashboard.
pub fn redirect_for_role(role: Option<UserRole>) -> (&'static str, Option<&'static str>) {
    match role {
        Some(UserRole::Patient) => ("/patients/dashboard", None),
        Some(UserRole::Doctor) => ("/doctors/dashboard", None),
        Some(UserRole::Secretary) => ("/appointments/secretary/dashboard", None),
        _ => ("/", Some("Unknown user role.")),
    }
}

/// Username used when the registrant leaves it blank: the local part of the email.
pub fn default_username(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("This email is already in use. Please use a different one.")]
    EmailTaken,

    #[error("The two password fields didn't match.")]
    PasswordMismatch,

    #[error("{}", .0.join(" "))]
    WeakPassword(Vec<String>),

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Your account is awaiting approval by an administrator.")]
    PendingApproval,

    #[error("Account profile not found")]
    ProfileNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Auth service error: {0}")]
    ExternalService(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken
            | AuthError::PasswordMismatch
            | AuthError::WeakPassword(_) => AppError::ValidationError(err.to_string()),
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::PendingApproval => AppError::Forbidden(err.to_string()),
            AuthError::ProfileNotFound => AppError::NotFound(err.to_string()),
            AuthError::DatabaseError(msg) => AppError::Database(msg),
            AuthError::ExternalService(msg) => AppError::ExternalService(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_role_has_its_dashboard() {
        assert_eq!(redirect_for_role(Some(UserRole::Patient)).0, "/patients/dashboard");
        assert_eq!(redirect_for_role(Some(UserRole::Doctor)).0, "/doctors/dashboard");
        assert_eq!(
            redirect_for_role(Some(UserRole::Secretary)).0,
            "/appointments/secretary/dashboard"
        );
    }

    #[test]
    fn unknown_role_goes_home_with_warning() {
        assert_eq!(redirect_for_role(None), ("/", Some("Unknown user role.")));
        assert_eq!(redirect_for_role(Some(UserRole::Admin)).0, "/");
    }

    #[test]
    fn username_defaults_to_local_part() {
        assert_eq!(default_username("layla.hassan@clinic.iq"), "layla.hassan");
    }
}
