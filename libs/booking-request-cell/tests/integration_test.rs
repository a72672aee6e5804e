use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_request_cell::error::BookingRequestError;
use booking_request_cell::models::BookingRequestStatus;
use booking_request_cell::router::booking_request_routes;
use booking_request_cell::services::BookingRequestService;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    booking_request_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(b) => builder.body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn booking_request_row(id: &str, doctor_id: &str, scheduled_time: DateTime<Utc>, status: &str) -> Value {
    json!({
        "id": id,
        "full_name": "Omar Ali",
        "date_of_birth": "1988-02-01",
        "contact_info": "+9647701234567",
        "doctor_id": doctor_id,
        "scheduled_time": scheduled_time.to_rfc3339(),
        "submitted_at": "2025-03-01T08:00:00Z",
        "status": status,
        "appointment_id": null,
        "doctors": { "full_name": "Sara Yousif" }
    })
}

fn secretary_token(config: &AppConfig) -> String {
    let user = TestUser::secretary("desk@clinic.test");
    JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1))
}

#[tokio::test]
async fn test_public_submission_raises_notification() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4().to_string();
    let request_id = Uuid::new_v4().to_string();
    let scheduled_time: DateTime<Utc> = "2099-06-01T14:30:00Z".parse().unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &Uuid::new_v4().to_string(), "Sara Yousif", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/booking_requests"))
        .and(body_partial_json(json!({ "full_name": "Omar Ali", "status": "pending" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            booking_request_row(&request_id, &doctor_id, scheduled_time, "pending")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .and(body_partial_json(json!({
            "title": "New Patient Booking",
            "message": "Omar Ali requested an appointment with Dr. Sara Yousif on 2099-06-01 02:30 PM.",
            "related_booking_request_id": request_id
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "title": "New Patient Booking",
            "message": "Omar Ali requested an appointment with Dr. Sara Yousif on 2099-06-01 02:30 PM.",
            "is_read": false,
            "created_at": "2025-03-01T08:00:00Z",
            "related_booking_request_id": request_id
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(request(
            "POST",
            "/",
            None,
            Some(json!({
                "full_name": "Omar Ali",
                "date_of_birth": "1988-02-01",
                "contact_info": "+9647701234567",
                "doctor_id": doctor_id,
                "scheduled_time": scheduled_time
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["booking_request"]["status"], "pending");
}

#[tokio::test]
async fn test_submission_for_unavailable_doctor_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4().to_string();

    let mut doctor = MockSupabaseResponses::doctor_response(&doctor_id, &Uuid::new_v4().to_string(), "Sara Yousif", "Cardiology");
    doctor["available"] = json!(false);
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/booking_requests"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(request(
            "POST",
            "/",
            None,
            Some(json!({
                "full_name": "Omar Ali",
                "date_of_birth": "1988-02-01",
                "contact_info": "+9647701234567",
                "doctor_id": doctor_id,
                "scheduled_time": Utc::now() + Duration::days(1)
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submission_missing_fields_is_a_validation_error() {
    let config = TestConfig::default().to_app_config();

    let response = create_test_app(config)
        .oneshot(request("POST", "/", None, Some(json!({ "full_name": "Omar Ali" }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Contact information is required");
}

#[tokio::test]
async fn test_review_requires_secretary() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::doctor("doctor@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    let app = create_test_app(config);

    let response = app
        .clone()
        .oneshot(request("GET", "/", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(request("GET", "/api/new-requests", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let token = secretary_token(&config);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("order", "submitted_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_request_row(&Uuid::new_v4().to_string(), &doctor_id, Utc::now() + Duration::days(1), "pending")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(request("GET", "/?status=pending", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["booking_requests"].as_array().unwrap().len(), 1);
    assert_eq!(body["booking_requests"][0]["doctors"]["full_name"], "Sara Yousif");
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_unread_notifications_with_count() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let token = secretary_token(&config);

    let notification = |created_at: &str| json!({
        "id": Uuid::new_v4(),
        "title": "New Patient Booking",
        "message": "Omar Ali requested an appointment",
        "is_read": false,
        "created_at": created_at,
        "related_booking_request_id": Uuid::new_v4()
    });
    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("is_read", "eq.false"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            notification("2025-03-02T08:00:00Z"),
            notification("2025-03-01T08:00:00Z")
        ])))
        .mount(&mock_server)
        .await;

    let response = create_test_app(config)
        .oneshot(request("GET", "/api/new-requests", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["notifications"][0]["created_at"], "2025-03-02T08:00:00Z");
}

#[tokio::test]
async fn test_mark_unknown_notification_read() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let token = secretary_token(&config);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let uri = format!("/notifications/{}/read", Uuid::new_v4());
    let response = create_test_app(config)
        .oneshot(request("POST", &uri, Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_confirm_creates_patient_and_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let request_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();
    let scheduled_time = Utc::now() + Duration::days(1);

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .and(query_param("id", format!("eq.{}", request_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_request_row(&request_id, &doctor_id, scheduled_time, "pending")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({
            "full_name": "Omar Ali",
            "mobile": "+9647701234567",
            "doctor_id": doctor_id
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "Omar Ali", Some(&doctor_id))
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": patient_id }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &Uuid::new_v4().to_string(), "Sara Yousif", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "queue_number"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "queue_number": 1 }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "patient_id": patient_id, "queue_number": 2 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&appointment_id, &patient_id, &doctor_id, scheduled_time, 2, "pending")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut confirmed = booking_request_row(&request_id, &doctor_id, scheduled_time, "confirmed");
    confirmed["appointment_id"] = json!(appointment_id);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/booking_requests"))
        .and(query_param("status", "eq.pending"))
        .and(body_partial_json(json!({ "status": "confirmed", "appointment_id": appointment_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("related_booking_request_id", format!("eq.{}", request_id)))
        .and(body_partial_json(json!({ "is_read": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = secretary_token(&config);
    let uri = format!("/{}/confirm", request_id);
    let response = create_test_app(config)
        .oneshot(request("POST", &uri, Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["booking_request"]["status"], "confirmed");
    assert_eq!(body["appointment"]["queue_number"], 2);
    assert_eq!(body["message"], "Booking confirmed for Omar Ali.");
}

/// Request lookup, free slot, patient insert and doctor lookup shared by the confirm flows.
async fn mount_confirm_preconditions(
    server: &MockServer,
    request_id: &str,
    doctor_id: &str,
    patient_id: &str,
    scheduled_time: DateTime<Utc>,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .and(query_param("id", format!("eq.{}", request_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_request_row(request_id, doctor_id, scheduled_time, "pending")
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(patient_id, "Omar Ali", Some(doctor_id))
        ])))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": patient_id }])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(doctor_id, &Uuid::new_v4().to_string(), "Sara Yousif", "Cardiology")
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "queue_number"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_confirm_lost_to_another_review_rolls_back() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let request_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();
    let scheduled_time = Utc::now() + Duration::days(1);

    mount_confirm_preconditions(&mock_server, &request_id, &doctor_id, &patient_id, scheduled_time).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&appointment_id, &patient_id, &doctor_id, scheduled_time, 1, "pending")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/booking_requests"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let token = secretary_token(&config);
    let uri = format!("/{}/confirm", request_id);
    let response = create_test_app(config)
        .oneshot(request("POST", &uri, Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_failed_booking_removes_new_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let request_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let scheduled_time = Utc::now() + Duration::days(1);

    mount_confirm_preconditions(&mock_server, &request_id, &doctor_id, &patient_id, scheduled_time).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("insert failed"))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/booking_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let token = secretary_token(&config);
    let service = BookingRequestService::new(&config);
    let result = service.confirm(&request_id, &token).await;

    tokio_test::assert_err!(&result);
}

#[tokio::test]
async fn test_reviewed_request_cannot_be_reviewed_again() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let request_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_request_row(&request_id, &Uuid::new_v4().to_string(), Utc::now() + Duration::days(1), "rejected")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = BookingRequestService::new(&config);

    let result = service.confirm(&request_id, "test-token").await;
    assert_matches!(
        result,
        Err(BookingRequestError::InvalidStatusTransition {
            from: BookingRequestStatus::Rejected,
            to: BookingRequestStatus::Confirmed
        })
    );

    let result = tokio_test::assert_err!(service.reject(&request_id, "test-token").await);
    assert_matches!(result, BookingRequestError::InvalidStatusTransition { .. });
}

#[tokio::test]
async fn test_reject_pending_request() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let request_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let scheduled_time = Utc::now() + Duration::days(1);

    Mock::given(method("GET"))
        .and(path("/rest/v1/booking_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_request_row(&request_id, &doctor_id, scheduled_time, "pending")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/booking_requests"))
        .and(body_partial_json(json!({ "status": "rejected" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            booking_request_row(&request_id, &doctor_id, scheduled_time, "rejected")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let rejected = BookingRequestService::new(&config)
        .reject(&request_id, "test-token")
        .await
        .unwrap();

    assert_eq!(rejected.status, BookingRequestStatus::Rejected);
}
