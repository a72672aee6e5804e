use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::roles::{require_role, require_staff};

use crate::models::{PatientForm, PatientSearchQuery};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(form): Json<PatientForm>,
) -> Result<Json<Value>, AppError> {
    let patient = PatientService::new(&config)
        .create_patient(form, &user, auth.token())
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let patients = PatientService::new(&config)
        .list_patients(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len(),
        "query": query.q
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let patient = PatientService::new(&config)
        .get_patient(&patient_id, auth.token())
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
    Json(form): Json<PatientForm>,
) -> Result<Json<Value>, AppError> {
    let patient = PatientService::new(&config)
        .update_patient(&patient_id, form, &user, auth.token())
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn patient_dashboard(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Patient])?;

    let dashboard = PatientService::new(&config)
        .dashboard_for(&user, auth.token())
        .await?;

    Ok(Json(json!(dashboard)))
}
