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
use shared_utils::clock::ClinicClock;
use shared_utils::roles::{require_secretary, require_staff};

use crate::models::{
    AppointmentListQuery, BookAppointmentRequest, CallNextQuery, SortOrder, UpdateAppointmentRequest,
};
use crate::services::{AppointmentBookingService, QueueService, SecretaryDashboardService};

// ==============================================================================
// APPOINTMENT MANAGEMENT
// ==============================================================================

/// Books the appointment and answers with its printable ticket.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.book_appointment(request, auth.token()).await?;
    let ticket = booking_service
        .appointment_ticket(&appointment.id.to_string(), &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "ticket": ticket,
        "message": format!(
            "Appointment booked for {} with {} at {}.",
            ticket.appointment.patient_name(),
            ticket.doctor_name,
            ClinicClock::from_config(&state).local(appointment.scheduled_time).format("%I:%M %p")
        )
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let appointment = AppointmentBookingService::new(&state)
        .get_appointment(&appointment_id, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn appointment_ticket(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let ticket = AppointmentBookingService::new(&state)
        .appointment_ticket(&appointment_id, &user, auth.token())
        .await?;

    Ok(Json(json!(ticket)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let appointment = AppointmentBookingService::new(&state)
        .update_appointment(&appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully."
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    AppointmentBookingService::new(&state)
        .delete_appointment(&appointment_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully."
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let page = AppointmentBookingService::new(&state)
        .list_appointments(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": page,
        "search_query": query.q.unwrap_or_default(),
        "current_sort": SortOrder::parse(query.sort.as_deref()).as_param()
    })))
}

#[axum::debug_handler]
pub async fn secretary_dashboard(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let dashboard = SecretaryDashboardService::new(&state)
        .dashboard(auth.token())
        .await?;

    Ok(Json(json!(dashboard)))
}

// ==============================================================================
// QUEUE
// ==============================================================================

/// Waiting-room screen; no session required.
#[axum::debug_handler]
pub async fn queue_display(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let queues = QueueService::new(&state).queue_data(None).await?;

    Ok(Json(json!({ "queues": queues })))
}

#[axum::debug_handler]
pub async fn queue_number_api(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let queues = QueueService::new(&state).queue_data(Some(auth.token())).await?;

    Ok(Json(json!({ "queues": queues })))
}

#[axum::debug_handler]
pub async fn call_next(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<CallNextQuery>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let queue_service = QueueService::new(&state);
    let called = queue_service.call_next(query.doctor_id, auth.token()).await?;
    let queues = queue_service.queue_data(Some(auth.token())).await?;

    Ok(Json(json!({
        "success": called.is_some(),
        "called": called,
        "queues": queues
    })))
}

#[axum::debug_handler]
pub async fn current_patient_api(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_secretary(&user)?;

    let current = QueueService::new(&state).current_patient(auth.token()).await?;

    Ok(Json(json!(current)))
}
