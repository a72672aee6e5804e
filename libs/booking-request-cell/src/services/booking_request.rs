use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::{Appointment, BookAppointmentRequest};
use appointment_cell::services::{AppointmentBookingService, AppointmentLifecycleService, ConflictDetectionService};
use doctor_cell::services::DoctorService;
use patient_cell::models::PatientForm;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::ClinicClock;

use crate::error::BookingRequestError;
use crate::models::{
    new_booking_message, BookingRequest, BookingRequestListQuery, BookingRequestStatus, SubmitBookingRequest,
};
use crate::services::notification::NotificationService;

const REQUEST_SELECT: &str = "*,doctors(full_name)";

pub struct BookingRequestService {
    supabase: Arc<SupabaseClient>,
    notifications: NotificationService,
    doctors: DoctorService,
    patients: PatientService,
    appointments: AppointmentBookingService,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
    clock: ClinicClock,
}

impl BookingRequestService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            notifications: NotificationService::new(Arc::clone(&supabase)),
            conflicts: ConflictDetectionService::new(Arc::clone(&supabase)),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
            appointments: AppointmentBookingService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            clock: ClinicClock::from_config(config),
            supabase,
        }
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Public entry point: records the request and raises a notification for the front desk.
    pub async fn submit(&self, form: SubmitBookingRequest) -> Result<BookingRequest, BookingRequestError> {
        let now = self.clock.now();
        let request = form.validate(now, self.clock.local_date(now))?;

        let doctor = self
            .doctors
            .get_doctor(&request.doctor_id.to_string(), None)
            .await?;
        if !doctor.available {
            return Err(BookingRequestError::DoctorUnavailable);
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "full_name": request.full_name,
            "date_of_birth": request.date_of_birth,
            "contact_info": request.contact_info,
            "doctor_id": request.doctor_id,
            "scheduled_time": request.scheduled_time.to_rfc3339(),
            "submitted_at": Utc::now().to_rfc3339(),
            "status": BookingRequestStatus::Pending,
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/booking_requests",
            None,
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| BookingRequestError::DatabaseError("Failed to save booking request".to_string()))?;
        let booking_request: BookingRequest = serde_json::from_value(row)?;

        let message = new_booking_message(
            &booking_request.full_name,
            &doctor.full_name,
            self.clock.local(booking_request.scheduled_time),
        );
        self.notifications
            .notify_new_booking(booking_request.id, message, None)
            .await?;

        info!("Booking request {} submitted for doctor {}", booking_request.id, doctor.id);
        Ok(booking_request)
    }

    pub async fn list(
        &self,
        query: &BookingRequestListQuery,
        auth_token: &str,
    ) -> Result<Vec<BookingRequest>, BookingRequestError> {
        let mut path = format!("/rest/v1/booking_requests?order=submitted_at.desc&select={}", REQUEST_SELECT);
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BookingRequest>, _>>()?)
    }

    pub async fn get(&self, request_id: &str, auth_token: &str) -> Result<BookingRequest, BookingRequestError> {
        debug!("Fetching booking request {}", request_id);

        let path = format!("/rest/v1/booking_requests?id=eq.{}&select={}", request_id, REQUEST_SELECT);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = rows.into_iter().next().ok_or(BookingRequestError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Turns a pending request into a patient record and a queued appointment.
    pub async fn confirm(
        &self,
        request_id: &str,
        auth_token: &str,
    ) -> Result<(BookingRequest, Appointment), BookingRequestError> {
        let request = self.get(request_id, auth_token).await?;
        request.status.ensure_transition(BookingRequestStatus::Confirmed)?;

        // Checked up front so a stale or clashing slot does not leave an orphan patient behind
        self.lifecycle
            .validate_appointment_timing(request.scheduled_time, self.clock.now())?;
        self.conflicts
            .ensure_free(request.doctor_id, request.scheduled_time, None, auth_token)
            .await?;

        let patient = self
            .patients
            .register_from_booking(
                PatientForm {
                    full_name: Some(request.full_name.clone()),
                    date_of_birth: Some(request.date_of_birth),
                    mobile: Some(request.contact_info.clone()),
                    doctor_id: Some(request.doctor_id),
                    ..Default::default()
                },
                auth_token,
            )
            .await?;

        let patient_id = patient.patient.id;

        let booked = self
            .appointments
            .book_appointment(
                BookAppointmentRequest {
                    patient_id,
                    doctor_id: request.doctor_id,
                    scheduled_time: request.scheduled_time,
                    status: None,
                    iqd_amount: None,
                    usd_amount: None,
                    notes: None,
                },
                auth_token,
            )
            .await;
        let appointment = match booked {
            Ok(appointment) => appointment,
            Err(e) => {
                self.discard("patients", patient_id, auth_token).await;
                return Err(e.into());
            }
        };

        let claimed = self
            .claim(
                request.id,
                json!({
                    "status": BookingRequestStatus::Confirmed,
                    "appointment_id": appointment.id,
                }),
                auth_token,
            )
            .await;
        let confirmed = match claimed {
            Ok(confirmed) => confirmed,
            Err(e) => {
                self.discard("appointments", appointment.id, auth_token).await;
                self.discard("patients", patient_id, auth_token).await;
                return Err(e);
            }
        };

        self.notifications
            .mark_read_for_request(confirmed.id, auth_token)
            .await?;

        info!(
            "Booking request {} confirmed as appointment {} (queue #{})",
            confirmed.id, appointment.id, appointment.queue_number
        );
        Ok((confirmed, appointment))
    }

    pub async fn reject(&self, request_id: &str, auth_token: &str) -> Result<BookingRequest, BookingRequestError> {
        let request = self.get(request_id, auth_token).await?;
        request.status.ensure_transition(BookingRequestStatus::Rejected)?;

        let rejected = self
            .review(request.id, json!({ "status": BookingRequestStatus::Rejected }), auth_token)
            .await?;

        info!("Booking request {} rejected", rejected.id);
        Ok(rejected)
    }

    /// Writes the review outcome and clears the request's notifications.
    async fn review(
        &self,
        request_id: Uuid,
        patch: Value,
        auth_token: &str,
    ) -> Result<BookingRequest, BookingRequestError> {
        let reviewed = self.claim(request_id, patch, auth_token).await?;

        self.notifications
            .mark_read_for_request(reviewed.id, auth_token)
            .await?;
        Ok(reviewed)
    }

    /// Applies `patch` only while the request is still pending.
    async fn claim(
        &self,
        request_id: Uuid,
        patch: Value,
        auth_token: &str,
    ) -> Result<BookingRequest, BookingRequestError> {
        let path = format!(
            "/rest/v1/booking_requests?id=eq.{}&status=eq.pending&select={}",
            request_id, REQUEST_SELECT
        );
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(patch),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let Some(row) = rows.into_iter().next() else {
            warn!("Booking request {} changed while it was being reviewed", request_id);
            return Err(BookingRequestError::AlreadyReviewed);
        };
        Ok(serde_json::from_value(row)?)
    }

    /// Rolls back a row written by an unfinished confirmation.
    async fn discard(&self, table: &str, id: Uuid, auth_token: &str) {
        let path = format!("/rest/v1/{}?id=eq.{}", table, id);
        let removed: anyhow::Result<Value> = self.supabase.request(Method::DELETE, &path, Some(auth_token), None).await;
        match removed {
            Ok(_) => info!("Rolled back {} row {}", table, id),
            Err(e) => warn!("Could not roll back {} row {}: {}", table, id, e),
        }
    }
}
