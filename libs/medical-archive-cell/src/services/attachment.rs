use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{attachment_path, ArchiveAttachment, ArchiveError, DecodedAttachment};

/// Attachment files in the storage bucket and their `archive_attachments` rows.
pub struct AttachmentStore {
    supabase: Arc<SupabaseClient>,
    bucket: String,
}

impl AttachmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, bucket: impl Into<String>) -> Self {
        Self {
            supabase,
            bucket: bucket.into(),
        }
    }

    pub async fn store(
        &self,
        archive_id: Uuid,
        file: DecodedAttachment,
        auth_token: &str,
    ) -> Result<ArchiveAttachment, ArchiveError> {
        let attachment_id = Uuid::new_v4();
        let object_path = attachment_path(archive_id, attachment_id, &file.extension);
        let size_bytes = file.bytes.len();

        let file_url = self
            .supabase
            .upload_object(&self.bucket, &object_path, file.bytes, file.content_type, Some(auth_token))
            .await
            .map_err(|e| ArchiveError::StorageError(e.to_string()))?;

        let row = json!({
            "id": attachment_id,
            "archive_id": archive_id,
            "file_path": object_path,
            "file_url": file_url,
            "content_type": file.content_type,
            "size_bytes": size_bytes,
            "description": file.description,
            "uploaded_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/archive_attachments",
            Some(auth_token),
            Some(row),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ArchiveError::DatabaseError("Failed to save attachment".to_string()))?;
        let attachment: ArchiveAttachment = serde_json::from_value(row)?;

        info!("Attached {} ({} bytes) to archive {}", attachment.file_path, size_bytes, archive_id);
        Ok(attachment)
    }

    pub async fn store_all(
        &self,
        archive_id: Uuid,
        files: Vec<DecodedAttachment>,
        auth_token: &str,
    ) -> Result<Vec<ArchiveAttachment>, ArchiveError> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            stored.push(self.store(archive_id, file, auth_token).await?);
        }
        Ok(stored)
    }

    /// Removes the stored object. An object already gone from the bucket is not an error.
    pub async fn delete_object(&self, attachment: &ArchiveAttachment, auth_token: &str) -> Result<(), ArchiveError> {
        match self
            .supabase
            .delete_object(&self.bucket, &attachment.file_path, Some(auth_token))
            .await
        {
            Ok(()) => {
                debug!("Deleted object {}", attachment.file_path);
                Ok(())
            }
            Err(e) if SupabaseError::is_not_found(&e) => {
                warn!("Object {} was already missing from storage", attachment.file_path);
                Ok(())
            }
            Err(e) => Err(ArchiveError::StorageError(e.to_string())),
        }
    }

    pub async fn delete_rows(&self, archive_id: Uuid, auth_token: &str) -> Result<(), ArchiveError> {
        let path = format!("/rest/v1/archive_attachments?archive_id=eq.{}", archive_id);
        let _: Value = self.supabase.request(Method::DELETE, &path, Some(auth_token), None).await?;
        Ok(())
    }
}
