use assert_matches::assert_matches;
use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::handlers::{create_doctor, home_summary};
use doctor_cell::models::CreateDoctorRequest;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn new_doctor_request(phone: &str) -> CreateDoctorRequest {
    CreateDoctorRequest {
        user_id: Uuid::new_v4(),
        full_name: "Dr. Hiba Salman".to_string(),
        specialty: "Dermatology".to_string(),
        phone: Some(phone.to_string()),
        clinic_address: None,
        photo_url: None,
        gender: None,
        short_bio: None,
        available: None,
        rating: None,
        consultation_fee: Some(20000),
        experience_years: Some(4),
    }
}

#[tokio::test]
async fn test_only_admin_creates_doctors() {
    let config = TestConfig::default().to_arc();
    let secretary = TestUser::secretary("desk@clinic.test").to_user();

    let result = create_doctor(
        State(config),
        auth_header(),
        Extension(secretary),
        Json(new_doctor_request("+9647700000000")),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_create_doctor_rejects_bad_phone() {
    let config = TestConfig::default().to_arc();
    let admin = TestUser::admin("root@clinic.test").to_user();

    let result = create_doctor(
        State(config),
        auth_header(),
        Extension(admin),
        Json(new_doctor_request("0770 000 0000")),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_create_doctor_defaults() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_arc();
    let admin = TestUser::admin("root@clinic.test").to_user();
    let request = new_doctor_request("+9647700000000");
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", request.user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &request.user_id.to_string(), "Dr. Hiba Salman", "Dermatology")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_doctor(State(config), auth_header(), Extension(admin), Json(request))
        .await
        .unwrap();

    assert_eq!(response.0["id"], doctor_id);
    assert_eq!(response.0["rating"], 5.0);
    assert_eq!(response.0["available"], true);
}

#[tokio::test]
async fn test_home_summary_for_secretary_lists_doctors_only() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_arc();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), "Dr. Ahmed Karim", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;

    let response = home_summary(
        State(config),
        auth_header(),
        Extension(TestUser::secretary("desk@clinic.test").to_user()),
    )
    .await
    .unwrap();

    assert_eq!(response.0["doctors"].as_array().unwrap().len(), 1);
    assert!(response.0["next_queue_number"].is_null());
    assert_eq!(response.0["todays_appointments"], json!([]));
}
