use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{query_timestamp, ClinicClock};

use crate::models::{
    AppointmentDetails, AppointmentError, AppointmentStatus, CurrentPatient, CurrentPatientResponse,
    DoctorQueue, DoctorQueueStatus, QueueEntry,
};
use crate::services::booking::DETAILS_SELECT;
use crate::services::lifecycle::AppointmentLifecycleService;

pub const AVERAGE_CONSULTATION_MINUTES: u32 = 15;
pub const DEFAULT_DEPARTMENT: &str = "general";

#[derive(Debug, Clone, Deserialize)]
pub struct QueueDoctor {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub specialty: Option<String>,
}

pub fn format_queue_number(queue_number: i32) -> String {
    format!("P-{:03}", queue_number)
}

pub fn queue_entry(clock: &ClinicClock, appointment: &AppointmentDetails) -> QueueEntry {
    QueueEntry {
        number: format_queue_number(appointment.appointment.queue_number),
        name: appointment.patient_name().to_string(),
        case: "normal".to_string(),
        time: clock.local(appointment.appointment.scheduled_time).format("%H:%M").to_string(),
    }
}

/// One board per doctor: the earliest pending appointment is being seen, the rest wait.
/// `pending` must already be ordered by scheduled time.
pub fn build_queues(clock: &ClinicClock, doctors: &[QueueDoctor], pending: &[AppointmentDetails]) -> Vec<DoctorQueue> {
    doctors
        .iter()
        .map(|doctor| {
            let mut entries = pending
                .iter()
                .filter(|a| a.appointment.doctor_id == doctor.id)
                .map(|a| queue_entry(clock, a));

            let current_patient = entries.next();
            let waiting: Vec<QueueEntry> = entries.collect();
            let status = if current_patient.is_some() {
                DoctorQueueStatus::Available
            } else {
                DoctorQueueStatus::OnBreak
            };

            DoctorQueue {
                doctor_id: doctor.id,
                doctor_name: doctor.full_name.clone(),
                doctor_specialty: doctor.specialty.clone().unwrap_or_else(|| "Specialist".to_string()),
                status,
                current_patient,
                waiting,
                avg_time: AVERAGE_CONSULTATION_MINUTES,
                department: DEFAULT_DEPARTMENT.to_string(),
            }
        })
        .collect()
}

/// Whole minutes a patient has been waiting past their slot, never negative.
pub fn current_patient_entry(appointment: &AppointmentDetails, now: DateTime<Utc>) -> CurrentPatient {
    let waited = (now - appointment.appointment.scheduled_time).num_minutes();
    CurrentPatient {
        number: appointment.appointment.queue_number,
        name: appointment.patient_name().to_string(),
        doctor_name: appointment.doctor_name().to_string(),
        wait_time: waited.max(0),
    }
}

pub struct QueueService {
    supabase: SupabaseClient,
    lifecycle_service: AppointmentLifecycleService,
    clock: ClinicClock,
}

impl QueueService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            lifecycle_service: AppointmentLifecycleService::new(),
            clock: ClinicClock::from_config(config),
        }
    }

    fn pending_today_path(&self, doctor_id: Option<Uuid>) -> String {
        let (start, end) = self.clock.day_bounds(self.clock.today());
        let mut path = format!(
            "/rest/v1/appointments?status=eq.pending&scheduled_time=gte.{}&scheduled_time=lt.{}&order=scheduled_time.asc&select={}",
            query_timestamp(start),
            query_timestamp(end),
            DETAILS_SELECT
        );
        if let Some(doctor_id) = doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        path
    }

    async fn pending_today(
        &self,
        doctor_id: Option<Uuid>,
        limit: Option<usize>,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let mut path = self.pending_today_path(doctor_id);
        if let Some(limit) = limit {
            path.push_str(&format!("&limit={}", limit));
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;
        Ok(rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AppointmentDetails>, _>>()?)
    }

    /// Today's boards for every doctor. Readable with the anon key for the waiting-room screen.
    pub async fn queue_data(&self, auth_token: Option<&str>) -> Result<Vec<DoctorQueue>, AppointmentError> {
        debug!("Building queue boards for {}", self.clock.today());

        let (doctors, pending) = futures::try_join!(
            async {
                self.supabase
                    .request::<Vec<QueueDoctor>>(
                        Method::GET,
                        "/rest/v1/doctors?select=id,full_name,specialty&order=full_name.asc",
                        auth_token,
                        None,
                    )
                    .await
                    .map_err(AppointmentError::from)
            },
            self.pending_today(None, None, auth_token),
        )?;

        Ok(build_queues(&self.clock, &doctors, &pending))
    }

    /// Completes the earliest pending appointment of today, optionally for one doctor.
    pub async fn call_next(
        &self,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<AppointmentDetails>, AppointmentError> {
        let Some(next) = self.pending_today(doctor_id, Some(1), Some(auth_token)).await?.into_iter().next() else {
            debug!("No pending appointments left to call");
            return Ok(None);
        };

        self.lifecycle_service
            .validate_status_transition(next.appointment.status, AppointmentStatus::Completed)?;

        // Guarded on status so a double click does not complete two patients
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.pending&select={}",
            next.appointment.id, DETAILS_SELECT
        );
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "status": AppointmentStatus::Completed })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let called = rows
            .into_iter()
            .next()
            .map(serde_json::from_value::<AppointmentDetails>)
            .transpose()?;

        if let Some(called) = &called {
            info!(
                "Called {} for doctor {}",
                format_queue_number(called.appointment.queue_number),
                called.appointment.doctor_id
            );
        }
        Ok(called)
    }

    pub async fn current_patient(&self, auth_token: &str) -> Result<CurrentPatientResponse, AppointmentError> {
        let pending = self.pending_today(None, Some(2), Some(auth_token)).await?;
        let now = self.clock.now();

        Ok(CurrentPatientResponse {
            current: pending.first().map(|a| current_patient_entry(a, now)),
            next: pending.get(1).map(|a| current_patient_entry(a, now)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::models::{Appointment, DoctorSummary, PatientName};

    fn pending(doctor_id: Uuid, patient: &str, queue_number: i32, scheduled_time: DateTime<Utc>) -> AppointmentDetails {
        AppointmentDetails {
            appointment: Appointment {
                id: Uuid::new_v4(),
                patient_id: Uuid::new_v4(),
                doctor_id,
                scheduled_time,
                queue_date: scheduled_time.date_naive(),
                queue_number,
                iqd_amount: 0,
                notes: None,
                status: AppointmentStatus::Pending,
                created_at: scheduled_time,
            },
            patient: Some(PatientName { full_name: patient.to_string() }),
            doctor: Some(DoctorSummary { full_name: "Dr. Ahmed Karim".to_string(), specialty: None }),
        }
    }

    #[test]
    fn queue_numbers_are_zero_padded() {
        assert_eq!(format_queue_number(1), "P-001");
        assert_eq!(format_queue_number(42), "P-042");
        assert_eq!(format_queue_number(1234), "P-1234");
    }

    #[test]
    fn boards_split_current_and_waiting() {
        let clock = ClinicClock::new(180);
        let busy = QueueDoctor { id: Uuid::new_v4(), full_name: "Dr. Ahmed Karim".into(), specialty: Some("Cardiology".into()) };
        let idle = QueueDoctor { id: Uuid::new_v4(), full_name: "Dr. Sara Yousif".into(), specialty: None };
        let nine = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();

        let appointments = vec![
            pending(busy.id, "Omar Ali", 1, nine),
            pending(busy.id, "Huda Nasser", 2, nine + Duration::minutes(20)),
            pending(busy.id, "Zaid Kamal", 3, nine + Duration::minutes(40)),
        ];

        let boards = build_queues(&clock, &[busy.clone(), idle], &appointments);

        assert_eq!(boards[0].status, DoctorQueueStatus::Available);
        assert_eq!(
            boards[0].current_patient,
            Some(QueueEntry {
                number: "P-001".into(),
                name: "Omar Ali".into(),
                case: "normal".into(),
                time: "09:00".into(),
            })
        );
        assert_eq!(boards[0].waiting.len(), 2);
        assert_eq!(boards[0].waiting[1].time, "09:40");

        assert_eq!(boards[1].status, DoctorQueueStatus::OnBreak);
        assert!(boards[1].current_patient.is_none());
        assert_eq!(boards[1].doctor_specialty, "Specialist");

        let json = serde_json::to_value(&boards[1]).unwrap();
        assert_eq!(json["status"], "on-break");
        assert_eq!(json["avgTime"], 15);
        assert_eq!(json["department"], "general");
        assert!(json["currentPatient"].is_null());
        assert_eq!(json["doctor_name"], "Dr. Sara Yousif");
    }

    #[test]
    fn wait_time_never_negative() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let doctor_id = Uuid::new_v4();

        let late = current_patient_entry(&pending(doctor_id, "Omar Ali", 1, now - Duration::seconds(25 * 60 + 30)), now);
        assert_eq!(late.wait_time, 25);

        let early = current_patient_entry(&pending(doctor_id, "Huda Nasser", 2, now + Duration::minutes(10)), now);
        assert_eq!(early.wait_time, 0);

        let json = serde_json::to_value(&late).unwrap();
        assert_eq!(json["type"], "Dr. Ahmed Karim");
        assert_eq!(json["number"], 1);
    }
}
