use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::UserRole;

use crate::models::{
    default_username, redirect_for_role, Account, AuthError, AuthSession, LoginRequest,
    RegisterRequest,
};
use crate::services::password::PasswordPolicy;

pub struct AccountService {
    supabase: SupabaseClient,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Self-service sign up. Only patients register themselves; staff accounts
    /// are provisioned and approved by an administrator.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&request.email)?;
        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_username(&email));

        if self.email_in_use(&email).await? {
            return Err(AuthError::EmailTaken);
        }

        if request.password1 != request.password2 {
            return Err(AuthError::PasswordMismatch);
        }

        PasswordPolicy::validate(&request.password1, &[("username", &username), ("email", &email)])
            .map_err(AuthError::WeakPassword)?;

        debug!("Signing up patient account for {}", email);

        let signup: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({
                "email": email,
                "password": request.password1,
                "data": { "role": UserRole::Patient, "username": username }
            })),
        ).await.map_err(|e| {
            if SupabaseError::is_conflict(&e) {
                AuthError::EmailTaken
            } else {
                AuthError::ExternalService(e.to_string())
            }
        })?;

        let user_id = signup_user_id(&signup)
            .ok_or_else(|| AuthError::ExternalService("Sign up response carried no user id".to_string()))?;
        let access_token = signup.get("access_token").and_then(Value::as_str).map(str::to_string);

        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/users",
            access_token.as_deref(),
            Some(json!({
                "id": user_id,
                "email": email,
                "username": username,
                "role": UserRole::Patient,
                "is_approved": true
            })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        info!("Registered patient account {}", user_id);

        let (redirect_to, _) = redirect_for_role(Some(UserRole::Patient));
        let message = if access_token.is_some() {
            None
        } else {
            Some("Check your inbox to confirm your email before signing in.".to_string())
        };

        Ok(AuthSession {
            user_id,
            email,
            role: UserRole::Patient,
            refresh_token: signup.get("refresh_token").and_then(Value::as_str).map(str::to_string),
            expires_in: signup.get("expires_in").and_then(Value::as_i64),
            access_token,
            redirect_to: redirect_to.to_string(),
            message,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&request.email)?;
        debug!("Password sign in for {}", email);

        let grant: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({ "email": email, "password": request.password })),
        ).await.map_err(|e| match e.downcast_ref::<SupabaseError>() {
            Some(SupabaseError::Unauthorized(_)) | Some(SupabaseError::Api { status: 400, .. }) => {
                AuthError::InvalidCredentials
            }
            _ => AuthError::ExternalService(e.to_string()),
        })?;

        let access_token = grant
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(AuthError::InvalidCredentials)?
            .to_string();
        let user_id = signup_user_id(&grant).ok_or(AuthError::InvalidCredentials)?;

        let account = self.get_account(&user_id.to_string(), &access_token).await?;

        if account.role.requires_approval() && !account.is_approved {
            warn!("Sign in refused for unapproved {} account {}", account.role, account.id);
            return Err(AuthError::PendingApproval);
        }

        let (redirect_to, warning) = redirect_for_role(Some(account.role));
        info!("User {} signed in as {}", account.id, account.role);

        Ok(AuthSession {
            user_id: account.id,
            email: account.email,
            role: account.role,
            access_token: Some(access_token),
            refresh_token: grant.get("refresh_token").and_then(Value::as_str).map(str::to_string),
            expires_in: grant.get("expires_in").and_then(Value::as_i64),
            redirect_to: redirect_to.to_string(),
            message: warning.map(str::to_string),
        })
    }

    pub async fn logout(&self, auth_token: &str) -> Result<(), AuthError> {
        let _: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/logout",
            Some(auth_token),
            None,
        ).await.map_err(|e| AuthError::ExternalService(e.to_string()))?;

        debug!("Session revoked");
        Ok(())
    }

    pub async fn get_account(&self, user_id: &str, auth_token: &str) -> Result<Account, AuthError> {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let row = rows.into_iter().next().ok_or(AuthError::ProfileNotFound)?;
        serde_json::from_value(row).map_err(|e| AuthError::DatabaseError(e.to_string()))
    }

    pub async fn email_in_use(&self, email: &str) -> Result<bool, AuthError> {
        let path = format!(
            "/rest/v1/users?email=eq.{}&select=id",
            urlencoding::encode(email)
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(!rows.is_empty())
    }
}

fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let pattern = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;

    if pattern.is_match(&email) {
        Ok(email)
    } else {
        Err(AuthError::ValidationError("Enter a valid email address.".to_string()))
    }
}

/// GoTrue answers with either a session (`{access_token, user: {id}}`) or a bare user (`{id}`).
fn signup_user_id(response: &Value) -> Option<Uuid> {
    response
        .get("user")
        .and_then(|u| u.get("id"))
        .or_else(|| response.get("id"))
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
}
