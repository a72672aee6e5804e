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
use shared_utils::roles::require_staff;

use crate::models::{ArchiveListQuery, ArchiveType, CreateArchiveRequest, UpdateArchiveRequest};
use crate::services::ArchiveService;

#[axum::debug_handler]
pub async fn list_archives(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ArchiveListQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let page = ArchiveService::new(&state)
        .list_archives(&query, auth.token())
        .await?;

    let types: Vec<Value> = [
        ArchiveType::Visit,
        ArchiveType::Lab,
        ArchiveType::Scan,
        ArchiveType::Prescription,
        ArchiveType::Other,
    ]
    .iter()
    .map(|t| json!({ "value": t, "label": t.label() }))
    .collect();

    Ok(Json(json!({
        "archives": page,
        "types": types,
        "selected_type": query.archive_type,
        "selected_doctor": query.doctor_id
    })))
}

#[axum::debug_handler]
pub async fn create_archive(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateArchiveRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let archive = ArchiveService::new(&state)
        .create_archive(request, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "archive": archive,
        "message": "Archive and attachments saved successfully."
    })))
}

#[axum::debug_handler]
pub async fn get_archive(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(archive_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let archive = ArchiveService::new(&state)
        .get_archive(&archive_id, auth.token())
        .await?;

    Ok(Json(json!(archive)))
}

#[axum::debug_handler]
pub async fn update_archive(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(archive_id): Path<String>,
    Json(request): Json<UpdateArchiveRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let archive = ArchiveService::new(&state)
        .update_archive(&archive_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "archive": archive,
        "message": "Archive updated successfully."
    })))
}

#[axum::debug_handler]
pub async fn delete_archive(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(archive_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    ArchiveService::new(&state)
        .delete_archive(&archive_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Archive and all attachments deleted."
    })))
}
