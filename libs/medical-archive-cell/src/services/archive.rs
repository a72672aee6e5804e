use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::pagination::{Page, DEFAULT_PAGE_SIZE};
use shared_utils::clock::{query_timestamp, ClinicClock};

use crate::models::{
    validate_title, ArchiveDetails, ArchiveError, ArchiveListQuery, ArchiveSummary, ArchiveWithAttachments,
    AttachmentUpload, CreateArchiveRequest, DecodedAttachment, PatientArchive, UpdateArchiveRequest,
};
use crate::services::attachment::AttachmentStore;

const DETAILS_SELECT: &str = "*,patients(full_name),doctors(full_name),archive_attachments(*)";

#[derive(Debug, Deserialize)]
struct ArchiveId {
    id: Uuid,
}

fn decode_all(uploads: &[AttachmentUpload]) -> Result<Vec<DecodedAttachment>, ArchiveError> {
    uploads.iter().map(AttachmentUpload::decode).collect()
}

/// PostgREST filter for a nullable foreign key.
fn nullable_eq(column: &str, value: Option<Uuid>) -> String {
    match value {
        Some(id) => format!("{}=eq.{}", column, id),
        None => format!("{}=is.null", column),
    }
}

pub struct ArchiveService {
    supabase: Arc<SupabaseClient>,
    attachments: AttachmentStore,
    doctors: DoctorService,
    clock: ClinicClock,
}

impl ArchiveService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            attachments: AttachmentStore::new(Arc::clone(&supabase), config.storage_bucket.clone()),
            doctors: DoctorService::new(config),
            clock: ClinicClock::from_config(config),
            supabase,
        }
    }

    /// Newest first, ten per page. Dates are clinic-local and inclusive.
    pub async fn list_archives(
        &self,
        query: &ArchiveListQuery,
        auth_token: &str,
    ) -> Result<Page<ArchiveSummary>, ArchiveError> {
        let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
        let patient_embed = if search.is_some() { "patients!inner(full_name)" } else { "patients(full_name)" };

        let mut path = format!(
            "/rest/v1/patient_archives?order=created_at.desc&select=*,{},doctors(full_name)",
            patient_embed
        );
        if let Some(archive_type) = query.archive_type {
            path.push_str(&format!("&archive_type=eq.{}", archive_type.as_str()));
        }
        if let Some(doctor_id) = query.doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        if let Some(q) = search {
            path.push_str(&format!("&patients.full_name=ilike.*{}*", urlencoding::encode(q)));
        }
        if let Some(start) = query.start_date {
            let (from, _) = self.clock.day_bounds(start);
            path.push_str(&format!("&created_at=gte.{}", query_timestamp(from)));
        }
        if let Some(end) = query.end_date {
            let (_, until) = self.clock.day_bounds(end);
            path.push_str(&format!("&created_at=lt.{}", query_timestamp(until)));
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let archives = rows
            .into_iter()
            .map(|row| serde_json::from_value::<PatientArchive>(row).map(ArchiveSummary::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::paginate(archives, query.page, DEFAULT_PAGE_SIZE))
    }

    pub async fn get_archive(&self, archive_id: &str, auth_token: &str) -> Result<ArchiveDetails, ArchiveError> {
        debug!("Fetching archive {}", archive_id);

        let path = format!("/rest/v1/patient_archives?id=eq.{}&select={}", archive_id, DETAILS_SELECT);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = rows.into_iter().next().ok_or(ArchiveError::NotFound)?;
        let archive: ArchiveWithAttachments = serde_json::from_value(row)?;
        Ok(archive.into())
    }

    /// Titles are unique per (patient, doctor) pair.
    async fn ensure_unique_title(
        &self,
        patient_id: Option<Uuid>,
        doctor_id: Option<Uuid>,
        title: &str,
        exclude_archive_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), ArchiveError> {
        let mut path = format!(
            "/rest/v1/patient_archives?select=id&title=eq.{}&{}&{}",
            urlencoding::encode(title),
            nullable_eq("patient_id", patient_id),
            nullable_eq("doctor_id", doctor_id)
        );
        if let Some(exclude) = exclude_archive_id {
            path.push_str(&format!("&id=neq.{}", exclude));
        }

        let rows: Vec<ArchiveId> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if rows.iter().any(|row| Some(row.id) != exclude_archive_id) {
            return Err(ArchiveError::DuplicateTitle);
        }
        Ok(())
    }

    pub async fn create_archive(
        &self,
        request: CreateArchiveRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<ArchiveDetails, ArchiveError> {
        let title = validate_title(&request.title)?;
        let files = decode_all(&request.attachments)?;

        let doctor_id = match request.doctor_id {
            Some(doctor_id) => Some(doctor_id),
            None if user.is_doctor() => Some(self.doctors.get_doctor_by_user(&user.id, auth_token).await?.id),
            None => None,
        };

        self.ensure_unique_title(request.patient_id, doctor_id, &title, None, auth_token)
            .await?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": Uuid::new_v4(),
            "patient_id": request.patient_id,
            "doctor_id": doctor_id,
            "title": title,
            "notes": request.notes,
            "archive_type": request.archive_type,
            "is_critical": request.is_critical,
            "created_at": now,
            "updated_at": now,
            "created_by": user.id,
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patient_archives",
            Some(auth_token),
            Some(row),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ArchiveError::DatabaseError("Failed to create archive".to_string()))?;
        let archive: PatientArchive = serde_json::from_value(row)?;

        let attachments = self.attachments.store_all(archive.id, files, auth_token).await?;

        info!(
            "Archive {} ({}) created by {} with {} attachments",
            archive.id,
            archive.archive_type.as_str(),
            user.id,
            attachments.len()
        );
        Ok(ArchiveWithAttachments { archive, archive_attachments: attachments }.into())
    }

    pub async fn update_archive(
        &self,
        archive_id: &str,
        request: UpdateArchiveRequest,
        auth_token: &str,
    ) -> Result<ArchiveDetails, ArchiveError> {
        let current = self.get_archive(archive_id, auth_token).await?.summary.archive;
        let files = decode_all(&request.attachments)?;

        let title = match request.title.as_deref() {
            Some(title) => validate_title(title)?,
            None => current.title.clone(),
        };
        let patient_id = request.patient_id.or(current.patient_id);
        let doctor_id = request.doctor_id.or(current.doctor_id);

        self.ensure_unique_title(patient_id, doctor_id, &title, Some(current.id), auth_token)
            .await?;

        let mut patch = Map::new();
        patch.insert("title".to_string(), json!(title));
        patch.insert("patient_id".to_string(), json!(patient_id));
        patch.insert("doctor_id".to_string(), json!(doctor_id));
        if let Some(notes) = request.notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        if let Some(archive_type) = request.archive_type {
            patch.insert("archive_type".to_string(), json!(archive_type));
        }
        if let Some(is_critical) = request.is_critical {
            patch.insert("is_critical".to_string(), json!(is_critical));
        }
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patient_archives?id=eq.{}", current.id);
        let _: Value = self.supabase.request(Method::PATCH, &path, Some(auth_token), Some(Value::Object(patch))).await?;

        self.attachments.store_all(current.id, files, auth_token).await?;

        info!("Archive {} updated", current.id);
        self.get_archive(&current.id.to_string(), auth_token).await
    }

    /// Storage objects go first, then the attachment rows, then the archive itself.
    pub async fn delete_archive(&self, archive_id: &str, auth_token: &str) -> Result<(), ArchiveError> {
        let details = self.get_archive(archive_id, auth_token).await?;
        let archive_id = details.summary.archive.id;

        for view in &details.attachments {
            self.attachments.delete_object(&view.attachment, auth_token).await?;
        }
        self.attachments.delete_rows(archive_id, auth_token).await?;

        let path = format!("/rest/v1/patient_archives?id=eq.{}", archive_id);
        let _: Value = self.supabase.request(Method::DELETE, &path, Some(auth_token), None).await?;

        info!("Archive {} deleted with {} attachments", archive_id, details.attachments.len());
        Ok(())
    }
}
