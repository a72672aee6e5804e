use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::roles::{require_doctor, require_staff};

use crate::models::{CreatePrescriptionRequest, PrescriptionListQuery, UpdatePrescriptionRequest, NO_APPOINTMENTS_TODAY};
use crate::services::PrescriptionService;

#[axum::debug_handler]
pub async fn next_prescription_target(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let target = PrescriptionService::new(&state)
        .next_target(&user, auth.token())
        .await?;

    Ok(Json(match target {
        Some(appointment) => json!({ "appointment": appointment }),
        None => json!({ "appointment": null, "message": NO_APPOINTMENTS_TODAY }),
    }))
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let issued = PrescriptionService::new(&state)
        .create(&appointment_id, request, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "prescription": issued.prescription,
        "next_appointment_id": issued.next_appointment_id,
        "message": "Prescription saved successfully."
    })))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PrescriptionListQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let prescriptions = PrescriptionService::new(&state)
        .list(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len(),
        "q": query.q
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let prescription = PrescriptionService::new(&state)
        .get(&prescription_id, auth.token())
        .await?;

    Ok(Json(json!(prescription)))
}

#[axum::debug_handler]
pub async fn update_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
    Json(request): Json<UpdatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let prescription = PrescriptionService::new(&state)
        .update(&prescription_id, request, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription updated successfully."
    })))
}

#[axum::debug_handler]
pub async fn delete_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    PrescriptionService::new(&state)
        .delete(&prescription_id, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescription deleted."
    })))
}

#[axum::debug_handler]
pub async fn download_prescription_pdf(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
) -> Result<Response, AppError> {
    require_staff(&user)?;

    let (id, pdf) = PrescriptionService::new(&state)
        .pdf_bytes(&prescription_id, auth.token())
        .await?;

    let disposition = format!("attachment; filename=\"prescription_{}.pdf\"", id);
    Ok((
        [(CONTENT_TYPE, "application/pdf".to_string()), (CONTENT_DISPOSITION, disposition)],
        pdf,
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn prescription_whatsapp_link(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let link = PrescriptionService::new(&state)
        .whatsapp_link(&prescription_id, auth.token())
        .await?;

    Ok(Json(json!({ "whatsapp_link": link })))
}
