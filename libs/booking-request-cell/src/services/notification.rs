use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::error::BookingRequestError;
use crate::models::{Notification, NEW_BOOKING_TITLE};

/// Front-desk inbox. Rows are only ever raised for online bookings.
pub struct NotificationService {
    supabase: Arc<SupabaseClient>,
}

impl NotificationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn notify_new_booking(
        &self,
        booking_request_id: Uuid,
        message: String,
        auth_token: Option<&str>,
    ) -> Result<Notification, BookingRequestError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "title": NEW_BOOKING_TITLE,
            "message": message,
            "is_read": false,
            "created_at": Utc::now().to_rfc3339(),
            "related_booking_request_id": booking_request_id,
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/notifications",
            auth_token,
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| BookingRequestError::DatabaseError("Failed to create notification".to_string()))?;
        let notification: Notification = serde_json::from_value(row)?;

        info!("Notification {} raised for booking request {}", notification.id, booking_request_id);
        Ok(notification)
    }

    /// Unread notifications, newest first.
    pub async fn unread(&self, auth_token: &str) -> Result<Vec<Notification>, BookingRequestError> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            "/rest/v1/notifications?is_read=eq.false&order=created_at.desc",
            Some(auth_token),
            None,
        ).await?;

        Ok(rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Notification>, _>>()?)
    }

    pub async fn mark_read(&self, notification_id: &str, auth_token: &str) -> Result<Notification, BookingRequestError> {
        let path = format!("/rest/v1/notifications?id=eq.{}", notification_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows.into_iter().next().ok_or(BookingRequestError::NotificationNotFound)?;
        debug!("Notification {} marked read", notification_id);
        Ok(serde_json::from_value(row)?)
    }

    /// Clears every notification pointing at a reviewed request.
    pub async fn mark_read_for_request(
        &self,
        booking_request_id: Uuid,
        auth_token: &str,
    ) -> Result<(), BookingRequestError> {
        let path = format!(
            "/rest/v1/notifications?related_booking_request_id=eq.{}&is_read=eq.false",
            booking_request_id
        );
        let _: Value = self.supabase.request(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
        ).await?;
        Ok(())
    }
}
