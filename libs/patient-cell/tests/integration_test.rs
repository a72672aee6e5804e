use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    patient_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json");
    match body {
        Some(b) => builder.body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_requires_authentication() {
    let config = TestConfig::default().to_app_config();

    let response = create_test_app(config)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_patient_role_cannot_create_patients() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::patient("someone@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    let response = create_test_app(config)
        .oneshot(authed("POST", "/", &token, Some(json!({ "full_name": "Omar Ali" }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_secretary_must_pick_doctor() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::secretary("desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    let response = create_test_app(config)
        .oneshot(authed("POST", "/", &token, Some(json!({ "full_name": "Omar Ali", "address": "Baghdad" }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_secretary_creates_limited_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::secretary("desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({
            "full_name": "Omar Ali",
            "doctor_id": doctor_id,
            "diabetes_prediction": "Pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "Omar Ali", Some(&doctor_id))
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(authed(
            "POST",
            "/",
            &token,
            Some(json!({
                "full_name": "Omar Ali",
                "date_of_birth": "1990-05-15",
                "doctor_id": doctor_id,
                "clinical_notes": "ignored for reception"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let patient = body_json(response).await;
    assert_eq!(patient["id"], patient_id);
    assert!(patient["age"].as_u64().unwrap() >= 34);

    let requests = mock_server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(sent.get("clinical_notes").is_none());
}

#[tokio::test]
async fn test_doctor_defaults_to_own_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::doctor("ahmed@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &user.id, "Dr. Ahmed Karim", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "doctor_id": doctor_id, "bmi": 24.5 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "Zainab Hassan", Some(&doctor_id))
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(authed("POST", "/", &token, Some(json!({ "full_name": "Zainab Hassan", "bmi": 24.5 }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["doctor_id"], doctor_id);
}

#[tokio::test]
async fn test_list_patients_with_name_search() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::doctor("ahmed@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("full_name", "ilike.*Omar Ali*"))
        .and(query_param("order", "full_name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&Uuid::new_v4().to_string(), "Omar Ali", None)
        ])))
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(authed("GET", "/?q=Omar%20Ali", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_response = body_json(response).await;
    assert_eq!(json_response["total"], 1);
    assert_eq!(json_response["patients"][0]["full_name"], "Omar Ali");
}

#[tokio::test]
async fn test_get_missing_patient_is_404() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::secretary("desk@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(authed("GET", &format!("/{}", Uuid::new_v4()), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patient_dashboard_by_email() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::patient("omar@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();

    let mut appointment = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(), &patient_id, &doctor_id, Utc::now(), 3, "pending",
    );
    appointment["doctors"] = json!({ "full_name": "Dr. Ahmed Karim" });

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("email", "eq.omar@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "Omar Ali", Some(&doctor_id))
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(authed("GET", "/dashboard", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["patient"]["full_name"], "Omar Ali");
    assert_eq!(dashboard["appointments"][0]["queue_number"], 3);
    assert_eq!(dashboard["appointments"][0]["doctors"]["full_name"], "Dr. Ahmed Karim");
}

#[tokio::test]
async fn test_patient_dashboard_without_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::patient("nobody@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(authed("GET", "/dashboard", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
