use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt;

use crate::models::{LoginRequest, RegisterRequest};
use crate::services::AccountService;

fn header_token(headers: &HeaderMap) -> Result<String, AppError> {
    let value = headers
        .get("Authorization")
        .map(|v| v.to_str())
        .transpose()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    bearer_token(value).map(str::to_string)
}

#[axum::debug_handler]
pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    let session = service.register(request).await?;

    Ok(Json(json!({
        "success": true,
        "session": session,
        "redirect_to": session.redirect_to,
        "message": session.message.clone().unwrap_or_else(|| "Account created successfully.".to_string())
    })))
}

#[axum::debug_handler]
pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    let session = service.login(request).await?;

    Ok(Json(json!({
        "success": true,
        "session": session,
        "role": session.role,
        "redirect_to": session.redirect_to,
        "warning": session.message
    })))
}

#[axum::debug_handler]
pub async fn logout(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    service.logout(auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "You have been logged out.",
        "redirect_to": "/auth/login"
    })))
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = header_token(&headers)?;
    let user = jwt::validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = header_token(&headers)?;
    let valid = jwt::validate_token(&token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let service = AccountService::new(&config);
    let account = service.get_account(&user.id, auth.token()).await?;

    Ok(Json(json!({
        "user_id": user.id,
        "account": account
    })))
}
