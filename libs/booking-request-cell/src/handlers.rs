use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::roles::require_secretary;

use crate::models::{BookingRequestListQuery, SubmitBookingRequest};
use crate::services::BookingRequestService;

/// Online booking form; no session required.
#[axum::debug_handler]
pub async fn submit_booking_request(
    State(state): State<Arc<AppConfig>>,
    Json(form): Json<SubmitBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_request = BookingRequestService::new(&state).submit(form).await?;

    Ok(Json(json!({
        "success": true,
        "booking_request": booking_request,
        "message": "Your booking request has been sent. The clinic will contact you to confirm it."
    })))
}

#[axum::debug_handler]
pub async fn list_booking_requests(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<BookingRequestListQuery>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let requests = BookingRequestService::new(&state)
        .list(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "booking_requests": requests,
        "status": query.status
    })))
}

#[axum::debug_handler]
pub async fn get_booking_request(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let request = BookingRequestService::new(&state)
        .get(&request_id, auth.token())
        .await?;

    Ok(Json(json!(request)))
}

#[axum::debug_handler]
pub async fn confirm_booking_request(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let (booking_request, appointment) = BookingRequestService::new(&state)
        .confirm(&request_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking_request": booking_request,
        "appointment": appointment,
        "message": format!("Booking confirmed for {}.", booking_request.full_name)
    })))
}

#[axum::debug_handler]
pub async fn reject_booking_request(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let booking_request = BookingRequestService::new(&state)
        .reject(&request_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking_request": booking_request,
        "message": "Booking request rejected."
    })))
}

// ==============================================================================
// NOTIFICATIONS
// ==============================================================================

/// Polled by the front desk for the unread badge.
#[axum::debug_handler]
pub async fn new_booking_requests_api(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let notifications = BookingRequestService::new(&state)
        .notifications()
        .unread(auth.token())
        .await?;

    Ok(Json(json!({
        "count": notifications.len(),
        "notifications": notifications
    })))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let notification = BookingRequestService::new(&state)
        .notifications()
        .mark_read(&notification_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}
