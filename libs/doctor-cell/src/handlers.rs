use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::roles::{require_doctor, require_role};

use crate::models::{CreateDoctorRequest, UpdateDoctorRequest};
use crate::services::{DoctorDashboardService, DoctorService};

// Public

#[axum::debug_handler]
pub async fn list_available_doctors(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&config).list_available(None).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&config).get_doctor(&doctor_id, None).await?;
    Ok(Json(json!(doctor)))
}

// Protected

#[axum::debug_handler]
pub async fn create_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Admin])?;

    let doctor = DoctorService::new(&config)
        .create_doctor(request, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor, UserRole::Admin])?;

    let doctor = DoctorService::new(&config)
        .update_doctor(&doctor_id, request, &user, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn doctor_dashboard(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let doctor = DoctorService::new(&config)
        .get_doctor_by_user(&user.id, auth.token())
        .await?;
    let dashboard = DoctorDashboardService::new(&config)
        .dashboard(doctor, auth.token())
        .await?;

    Ok(Json(json!(dashboard)))
}

#[axum::debug_handler]
pub async fn doctor_records(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let doctor = DoctorService::new(&config)
        .get_doctor_by_user(&user.id, auth.token())
        .await?;
    let patients = DoctorDashboardService::new(&config)
        .records(doctor.id, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn home_summary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let summary = DoctorDashboardService::new(&config)
        .home_summary(&user, auth.token())
        .await?;

    Ok(Json(json!(summary)))
}
