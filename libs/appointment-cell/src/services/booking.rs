use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::User;
use shared_models::pagination::{Page, DEFAULT_PAGE_SIZE};
use shared_utils::clock::ClinicClock;

use crate::models::{
    validate_amounts, Appointment, AppointmentDetails, AppointmentError, AppointmentListQuery,
    AppointmentTicket, BookAppointmentRequest, SortOrder, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Attempts at claiming a queue number before giving up on a contended day.
pub const MAX_QUEUE_ATTEMPTS: u32 = 3;

pub const DETAILS_SELECT: &str = "*,patients(full_name),doctors(full_name,specialty)";

#[derive(Debug, Deserialize)]
struct QueueSlot {
    queue_number: i32,
}

/// Next free position for a doctor's day. Equals `count + 1` while the day has
/// no gaps; after a deletion it skips past the highest number still in use.
pub fn next_queue_number(taken: &[i32]) -> i32 {
    let count = taken.len() as i32;
    let highest = taken.iter().copied().max().unwrap_or(0);
    count.max(highest) + 1
}

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    doctors: DoctorService,
    clock: ClinicClock,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::new(),
            doctors: DoctorService::new(config),
            clock: ClinicClock::from_config(config),
            supabase,
        }
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {}", request.patient_id, request.doctor_id);

        let iqd_amount = validate_amounts(request.iqd_amount, request.usd_amount)?;
        self.lifecycle_service
            .validate_appointment_timing(request.scheduled_time, self.clock.now())?;

        self.ensure_patient_exists(request.patient_id, auth_token).await?;
        self.ensure_doctor_exists(request.doctor_id, auth_token).await?;
        self.conflict_service
            .ensure_free(request.doctor_id, request.scheduled_time, None, auth_token)
            .await?;

        let queue_date = self.clock.local_date(request.scheduled_time);
        let appointment_id = Uuid::new_v4();

        for attempt in 1..=MAX_QUEUE_ATTEMPTS {
            let taken = self.taken_queue_numbers(request.doctor_id, queue_date, auth_token).await?;
            let queue_number = next_queue_number(&taken);
            debug!(
                "Attempt {} claiming queue number {} for doctor {} on {}",
                attempt, queue_number, request.doctor_id, queue_date
            );

            let row = json!({
                "id": appointment_id,
                "patient_id": request.patient_id,
                "doctor_id": request.doctor_id,
                "scheduled_time": request.scheduled_time.to_rfc3339(),
                "queue_date": queue_date,
                "queue_number": queue_number,
                "iqd_amount": iqd_amount,
                "notes": request.notes,
                "status": request.status.unwrap_or_default(),
                "created_at": Utc::now().to_rfc3339()
            });

            let result: anyhow::Result<Vec<Value>> = self.supabase.request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(row),
                Some(SupabaseClient::representation_headers()),
            ).await;

            match result {
                Ok(rows) => {
                    let row = rows.into_iter().next().ok_or_else(|| {
                        AppointmentError::DatabaseError("Failed to create appointment".to_string())
                    })?;
                    let appointment: Appointment = serde_json::from_value(row)?;
                    info!(
                        "Appointment {} booked as #{} for doctor {} on {}",
                        appointment.id, appointment.queue_number, appointment.doctor_id, queue_date
                    );
                    return Ok(appointment);
                }
                Err(e) if SupabaseError::is_conflict(&e) => {
                    warn!(
                        "Queue number {} already claimed, retrying attempt {}/{}",
                        queue_number, attempt, MAX_QUEUE_ATTEMPTS
                    );
                    if attempt < MAX_QUEUE_ATTEMPTS {
                        tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppointmentError::QueueContention)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<AppointmentDetails, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}&select={}", appointment_id, DETAILS_SELECT);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn appointment_ticket(
        &self,
        appointment_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<AppointmentTicket, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let (doctor_name, doctor_specialty) = appointment
            .doctor
            .as_ref()
            .map(|d| (d.full_name.clone(), d.specialty.clone().unwrap_or_default()))
            .unwrap_or_default();
        let secretary_name = user
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .unwrap_or(user.id.as_str())
            .to_string();

        Ok(AppointmentTicket {
            appointment,
            doctor_name,
            doctor_specialty,
            secretary_name,
        })
    }

    /// Same checks as booking, with the appointment itself left out of the overlap test.
    /// Moving to another doctor or clinic day claims a fresh queue number there.
    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let existing = self.fetch_appointment(appointment_id, auth_token).await?;

        let iqd_amount = validate_amounts(request.iqd_amount.or(Some(existing.iqd_amount)), request.usd_amount)?;
        let doctor_id = request.doctor_id.unwrap_or(existing.doctor_id);
        let patient_id = request.patient_id.unwrap_or(existing.patient_id);
        let scheduled_time = request.scheduled_time.unwrap_or(existing.scheduled_time);
        let status = request.status.unwrap_or(existing.status);

        if scheduled_time != existing.scheduled_time {
            self.lifecycle_service
                .validate_appointment_timing(scheduled_time, self.clock.now())?;
        }
        self.lifecycle_service.validate_status_transition(existing.status, status)?;

        if patient_id != existing.patient_id {
            self.ensure_patient_exists(patient_id, auth_token).await?;
        }
        if doctor_id != existing.doctor_id {
            self.ensure_doctor_exists(doctor_id, auth_token).await?;
        }
        self.conflict_service
            .ensure_free(doctor_id, scheduled_time, Some(existing.id), auth_token)
            .await?;

        let mut update_data = Map::new();
        update_data.insert("patient_id".to_string(), json!(patient_id));
        update_data.insert("doctor_id".to_string(), json!(doctor_id));
        update_data.insert("scheduled_time".to_string(), json!(scheduled_time.to_rfc3339()));
        update_data.insert("status".to_string(), json!(status));
        update_data.insert("iqd_amount".to_string(), json!(iqd_amount));
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }

        let queue_date = self.clock.local_date(scheduled_time);
        let requeue = doctor_id != existing.doctor_id || queue_date != existing.queue_date;
        let path = format!("/rest/v1/appointments?id=eq.{}", existing.id);

        for attempt in 1..=MAX_QUEUE_ATTEMPTS {
            if requeue {
                let taken = self.taken_queue_numbers(doctor_id, queue_date, auth_token).await?;
                update_data.insert("queue_date".to_string(), json!(queue_date));
                update_data.insert("queue_number".to_string(), json!(next_queue_number(&taken)));
            }

            let result: anyhow::Result<Vec<Value>> = self.supabase.request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data.clone())),
                Some(SupabaseClient::representation_headers()),
            ).await;

            match result {
                Ok(rows) => {
                    let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
                    let appointment: Appointment = serde_json::from_value(row)?;
                    info!("Appointment {} updated ({})", appointment.id, appointment.status);
                    return Ok(appointment);
                }
                Err(e) if requeue && SupabaseError::is_conflict(&e) => {
                    warn!("Queue number contention while moving appointment {}, attempt {}", existing.id, attempt);
                    if attempt < MAX_QUEUE_ATTEMPTS {
                        tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppointmentError::QueueContention)
    }

    pub async fn delete_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if rows.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    /// Secretary listing: optional patient-name search, sortable, ten per page.
    pub async fn list_appointments(
        &self,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Page<AppointmentDetails>, AppointmentError> {
        let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

        let path = match search {
            Some(q) => format!(
                "/rest/v1/appointments?select=*,patients!inner(full_name),doctors(full_name,specialty)&patients.full_name=ilike.*{}*",
                urlencoding::encode(q)
            ),
            None => format!("/rest/v1/appointments?select={}", DETAILS_SELECT),
        };

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let mut appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AppointmentDetails>, _>>()?;

        SortOrder::parse(query.sort.as_deref()).apply(&mut appointments);

        Ok(Page::paginate(appointments, query.page, DEFAULT_PAGE_SIZE))
    }

    async fn fetch_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    async fn taken_queue_numbers(
        &self,
        doctor_id: Uuid,
        queue_date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<i32>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&queue_date=eq.{}&select=queue_number",
            doctor_id, queue_date
        );
        let rows: Vec<QueueSlot> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(rows.into_iter().map(|slot| slot.queue_number).collect())
    }

    async fn ensure_patient_exists(&self, patient_id: Uuid, auth_token: &str) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if rows.is_empty() {
            return Err(AppointmentError::PatientNotFound);
        }
        Ok(())
    }

    async fn ensure_doctor_exists(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), AppointmentError> {
        match self.doctors.get_doctor(&doctor_id.to_string(), Some(auth_token)).await {
            Ok(_) => Ok(()),
            Err(DoctorError::NotFound) | Err(DoctorError::ProfileNotFound) => Err(AppointmentError::DoctorNotFound),
            Err(e) => Err(AppointmentError::DatabaseError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_numbers_follow_the_day_count() {
        assert_eq!(next_queue_number(&[]), 1);
        assert_eq!(next_queue_number(&[1, 2, 3]), 4);
    }

    #[test]
    fn queue_numbers_skip_past_gaps() {
        // #2 was deleted; #3 is still taken
        assert_eq!(next_queue_number(&[1, 3]), 4);
    }
}
