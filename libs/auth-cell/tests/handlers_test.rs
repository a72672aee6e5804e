use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, State},
    http::{HeaderMap, HeaderValue},
    Json,
};
use axum_extra::TypedHeader;
use headers::Authorization;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::handlers::{get_profile, register, validate_token};
use auth_cell::models::{AuthError, RegisterRequest};
use auth_cell::services::AccountService;
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_auth_header(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

#[tokio::test]
async fn test_validate_token_missing_header() {
    let config = TestConfig::default().to_arc();

    let result = validate_token(State(config), HeaderMap::new()).await;
    assert_matches!(result, Err(AppError::Auth(msg)) if msg == "Missing authorization header");
}

#[tokio::test]
async fn test_validate_token_reports_clinic_role() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::doctor("doc@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let response = validate_token(State(config), create_auth_header(&token)).await.unwrap().0;
    assert!(response.valid);
    assert_eq!(response.role.as_deref(), Some("doctor"));
}

#[tokio::test]
async fn test_weak_password_lists_every_issue() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_arc();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = register(
        State(config),
        Json(RegisterRequest {
            email: "huda@clinic.test".to_string(),
            password1: "1234567".to_string(),
            password2: "1234567".to_string(),
            username: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(msg)) => {
        assert!(msg.contains("too short"));
        assert!(msg.contains("entirely numeric"));
    });
}

#[tokio::test]
async fn test_email_in_use_checks_users_table() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.omar@clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.free@clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = AccountService::new(&config);
    assert!(service.email_in_use("omar@clinic.test").await.unwrap());
    assert!(!service.email_in_use("free@clinic.test").await.unwrap());
}

#[tokio::test]
async fn test_get_profile_returns_account_row() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_arc();
    let user = TestUser::secretary("desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(&user.id, &user.email, "secretary", true)
        ])))
        .mount(&mock_server)
        .await;

    let response = get_profile(
        State(config),
        TypedHeader(Authorization::bearer(&token).unwrap()),
        Extension(user.to_user()),
    )
    .await
    .unwrap();

    assert_eq!(response.0["account"]["role"], "secretary");
    assert_eq!(response.0["account"]["username"], "desk");
}

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = AccountService::new(&config)
        .get_account(&Uuid::new_v4().to_string(), "token")
        .await;
    let err = tokio_test::assert_err!(result);
    assert_matches!(err, AuthError::ProfileNotFound);
    assert_eq!(AppError::from(err).status_code(), axum::http::StatusCode::NOT_FOUND);
}
