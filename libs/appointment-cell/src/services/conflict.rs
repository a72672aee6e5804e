use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_utils::clock::query_timestamp;

use crate::models::AppointmentError;

/// Minimum spacing between two appointments of the same doctor.
pub const MIN_GAP_MINUTES: i64 = 1;

#[derive(Debug, Deserialize)]
struct SlotRow {
    id: Uuid,
}

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Closed window `[time - 1min, time + 1min]` around a requested slot.
    pub fn window(scheduled_time: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let gap = Duration::minutes(MIN_GAP_MINUTES);
        (scheduled_time - gap, scheduled_time + gap)
    }

    /// Ids of the doctor's appointments that sit within the gap of `scheduled_time`.
    pub async fn find_conflicts(
        &self,
        doctor_id: Uuid,
        scheduled_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, AppointmentError> {
        let (start, end) = Self::window(scheduled_time);
        debug!("Checking conflicts for doctor {} between {} and {}", doctor_id, start, end);

        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_time=gte.{}&scheduled_time=lte.{}&select=id",
            doctor_id,
            query_timestamp(start),
            query_timestamp(end)
        );
        if let Some(exclude) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", exclude));
        }

        let rows: Vec<SlotRow> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let conflicts: Vec<Uuid> = rows
            .into_iter()
            .map(|row| row.id)
            .filter(|id| Some(*id) != exclude_appointment_id)
            .collect();

        if !conflicts.is_empty() {
            warn!("Conflict detected for doctor {} - {} appointments too close", doctor_id, conflicts.len());
        }
        Ok(conflicts)
    }

    pub async fn ensure_free(
        &self,
        doctor_id: Uuid,
        scheduled_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let conflicts = self
            .find_conflicts(doctor_id, scheduled_time, exclude_appointment_id, auth_token)
            .await?;
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(AppointmentError::ConflictDetected)
        }
    }
}
