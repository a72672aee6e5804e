use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_models::error::AppError;

pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;
/// Request body cap for archive writes: one full-size attachment after base64
/// inflation, plus room for the JSON envelope.
pub const ARCHIVE_BODY_LIMIT: usize = MAX_ATTACHMENT_BYTES / 3 * 4 + 1024 * 1024;
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "jpg", "jpeg", "png", "gif"];
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

const TITLE_MAX: usize = 255;
const DESCRIPTION_MAX: usize = 255;

pub const DUPLICATE_TITLE_MESSAGE: &str = "An archive with this title already exists for this patient and doctor.";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    #[default]
    Visit,
    Lab,
    Scan,
    Prescription,
    Other,
}

impl ArchiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveType::Visit => "visit",
            ArchiveType::Lab => "lab",
            ArchiveType::Scan => "scan",
            ArchiveType::Prescription => "prescription",
            ArchiveType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArchiveType::Visit => "Visit",
            ArchiveType::Lab => "Lab Result",
            ArchiveType::Scan => "Scan",
            ArchiveType::Prescription => "Prescription",
            ArchiveType::Other => "Other",
        }
    }

    /// Badge colour used by the archive list.
    pub fn color_tag(&self) -> &'static str {
        match self {
            ArchiveType::Visit => "primary",
            ArchiveType::Lab => "success",
            ArchiveType::Scan => "warning",
            ArchiveType::Prescription => "info",
            ArchiveType::Other => "secondary",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameOnly {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientArchive {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub title: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub archive_type: ArchiveType,
    #[serde(default)]
    pub is_critical: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    #[serde(default, rename = "patients", skip_serializing_if = "Option::is_none")]
    pub patient: Option<NameOnly>,
    #[serde(default, rename = "doctors", skip_serializing_if = "Option::is_none")]
    pub doctor: Option<NameOnly>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveAttachment {
    pub id: Uuid,
    pub archive_id: Uuid,
    pub file_path: String,
    pub file_url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl ArchiveAttachment {
    fn extension(&self) -> String {
        self.file_path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }

    pub fn is_image(&self) -> bool {
        IMAGE_EXTENSIONS.contains(&self.extension().as_str())
    }

    pub fn is_pdf(&self) -> bool {
        self.extension() == "pdf"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    #[serde(flatten)]
    pub attachment: ArchiveAttachment,
    pub is_image: bool,
    pub is_pdf: bool,
    pub file_size: String,
}

impl From<ArchiveAttachment> for AttachmentView {
    fn from(attachment: ArchiveAttachment) -> Self {
        Self {
            is_image: attachment.is_image(),
            is_pdf: attachment.is_pdf(),
            file_size: human_file_size(attachment.size_bytes.max(0) as u64),
            attachment,
        }
    }
}

/// Sizes the way people read them: `"1 byte"`, `"512 bytes"`, `"1.5 KB"`, `"10.0 MB"`.
pub fn human_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = bytes as f64;
    match bytes {
        1 => "1 byte".to_string(),
        b if (b as f64) < KB => format!("{} bytes", b),
        _ if size < MB => format!("{:.1} KB", size / KB),
        _ if size < GB => format!("{:.1} MB", size / MB),
        _ => format!("{:.1} GB", size / GB),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    #[serde(flatten)]
    pub archive: PatientArchive,
    pub archive_type_label: &'static str,
    pub color_tag: &'static str,
}

impl From<PatientArchive> for ArchiveSummary {
    fn from(archive: PatientArchive) -> Self {
        Self {
            archive_type_label: archive.archive_type.label(),
            color_tag: archive.archive_type.color_tag(),
            archive,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveDetails {
    #[serde(flatten)]
    pub summary: ArchiveSummary,
    pub attachments: Vec<AttachmentView>,
}

/// Archive row as read with its attachments embedded.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveWithAttachments {
    #[serde(flatten)]
    pub archive: PatientArchive,
    #[serde(default)]
    pub archive_attachments: Vec<ArchiveAttachment>,
}

impl From<ArchiveWithAttachments> for ArchiveDetails {
    fn from(row: ArchiveWithAttachments) -> Self {
        let mut attachments = row.archive_attachments;
        attachments.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

        Self {
            summary: row.archive.into(),
            attachments: attachments.into_iter().map(AttachmentView::from).collect(),
        }
    }
}

// ==============================================================================
// ATTACHMENT UPLOADS
// ==============================================================================

/// File sent inline as base64, optionally as a `data:` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub data: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAttachment {
    pub extension: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub description: Option<String>,
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

impl AttachmentUpload {
    pub fn decode(&self) -> Result<DecodedAttachment, ArchiveError> {
        let extension = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or(ArchiveError::UnsupportedExtension)?;

        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        if description.as_ref().is_some_and(|d| d.chars().count() > DESCRIPTION_MAX) {
            return Err(ArchiveError::ValidationError(format!(
                "Attachment description must be at most {} characters",
                DESCRIPTION_MAX
            )));
        }

        let payload = match self.data.split_once(";base64,") {
            Some((_, data)) => data,
            None => self.data.as_str(),
        };
        // Cheap bound before decoding: base64 inflates by 4/3
        if payload.len() / 4 * 3 > MAX_ATTACHMENT_BYTES + 3 {
            return Err(ArchiveError::FileTooLarge);
        }
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| ArchiveError::ValidationError(format!("Attachment is not valid base64: {}", e)))?;
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(ArchiveError::FileTooLarge);
        }

        Ok(DecodedAttachment {
            content_type: content_type_for(&extension),
            extension,
            bytes,
            description,
        })
    }
}

/// Object key of an attachment inside the storage bucket.
pub fn attachment_path(archive_id: Uuid, file_id: Uuid, extension: &str) -> String {
    format!("patient_archives/{}/{}.{}", archive_id, file_id, extension)
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateArchiveRequest {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub archive_type: ArchiveType,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArchiveRequest {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub archive_type: Option<ArchiveType>,
    pub is_critical: Option<bool>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

pub fn validate_title(title: &str) -> Result<String, ArchiveError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ArchiveError::ValidationError("Title is required".to_string()));
    }
    if title.chars().count() > TITLE_MAX {
        return Err(ArchiveError::ValidationError(format!(
            "Title must be at most {} characters",
            TITLE_MAX
        )));
    }
    Ok(title.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveListQuery {
    pub archive_type: Option<ArchiveType>,
    pub doctor_id: Option<Uuid>,
    pub q: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<usize>,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive not found")]
    NotFound,

    #[error("{}", DUPLICATE_TITLE_MESSAGE)]
    DuplicateTitle,

    #[error("Unsupported file extension.")]
    UnsupportedExtension,

    #[error("File too large. Size should not exceed 10 MB.")]
    FileTooLarge,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for ArchiveError {
    fn from(err: anyhow::Error) -> Self {
        ArchiveError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        ArchiveError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<DoctorError> for ArchiveError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::ProfileNotFound => {
                ArchiveError::ValidationError("No doctor profile is linked to this account".to_string())
            }
            DoctorError::ValidationError(msg) | DoctorError::Forbidden(msg) => ArchiveError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => ArchiveError::DatabaseError(msg),
        }
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound => AppError::NotFound(err.to_string()),
            ArchiveError::DuplicateTitle
            | ArchiveError::UnsupportedExtension
            | ArchiveError::FileTooLarge => AppError::ValidationError(err.to_string()),
            ArchiveError::ValidationError(msg) => AppError::ValidationError(msg),
            ArchiveError::StorageError(msg) => AppError::ExternalService(msg),
            ArchiveError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
