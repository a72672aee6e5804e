use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Pull the raw token out of an `Authorization: Bearer` header value.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AppError> {
    let value = header_value
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = request
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str())
        .transpose()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = bearer_token(header_value)?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    debug!("Authenticated request for user {}", user.id);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_matches!(bearer_token(Some("Basic abc")), Err(AppError::Auth(_)));
        assert_matches!(bearer_token(Some("Bearer ")), Err(AppError::Auth(_)));
        assert_matches!(bearer_token(None), Err(AppError::Auth(_)));
    }

    #[test]
    fn user_comes_from_extensions() {
        let mut request = Request::new(());
        assert_matches!(extract_user(&request), Err(AppError::Auth(_)));

        request.extensions_mut().insert(User {
            id: "u1".into(),
            email: None,
            role: Some("doctor".into()),
            metadata: None,
            created_at: None,
        });
        assert_eq!(extract_user(&request).unwrap().id, "u1");
    }
}
