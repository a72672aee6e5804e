use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

pub const OVERLAP_MESSAGE: &str = "You must leave at least one minute between appointments for this doctor.";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub queue_date: NaiveDate,
    pub queue_number: i32,
    #[serde(default)]
    pub iqd_amount: i64,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientName {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub full_name: String,
    #[serde(default)]
    pub specialty: Option<String>,
}

/// Appointment row with the embedded patient and doctor names PostgREST joins in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(default, rename = "patients")]
    pub patient: Option<PatientName>,
    #[serde(default, rename = "doctors")]
    pub doctor: Option<DoctorSummary>,
}

impl AppointmentDetails {
    pub fn patient_name(&self) -> &str {
        self.patient.as_ref().map(|p| p.full_name.as_str()).unwrap_or("")
    }

    pub fn doctor_name(&self) -> &str {
        self.doctor.as_ref().map(|d| d.full_name.as_str()).unwrap_or("")
    }
}

/// Printable ticket handed to the patient at the front desk.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentTicket {
    pub appointment: AppointmentDetails,
    pub doctor_name: String,
    pub doctor_specialty: String,
    pub secretary_name: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub status: Option<AppointmentStatus>,
    pub iqd_amount: Option<i64>,
    /// Accepted on the form and validated, never stored.
    pub usd_amount: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub iqd_amount: Option<i64>,
    pub usd_amount: Option<f64>,
    pub notes: Option<String>,
}

/// Amounts must be non-negative; missing amounts count as zero.
pub fn validate_amounts(iqd_amount: Option<i64>, usd_amount: Option<f64>) -> Result<i64, AppointmentError> {
    let iqd = iqd_amount.unwrap_or(0);
    if iqd < 0 {
        return Err(AppointmentError::ValidationError("IQD amount cannot be negative.".to_string()));
    }
    if usd_amount.unwrap_or(0.0) < 0.0 {
        return Err(AppointmentError::ValidationError("USD amount cannot be negative.".to_string()));
    }
    Ok(iqd)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Patient,
    Doctor,
    ScheduledTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self { field: SortField::ScheduledTime, descending: true }
    }
}

impl SortOrder {
    /// `patient`, `doctor` or `scheduled_time`, optionally prefixed with `-`.
    /// Anything else falls back to newest first.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        let (descending, key) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let field = match key {
            "patient" => SortField::Patient,
            "doctor" => SortField::Doctor,
            "scheduled_time" => SortField::ScheduledTime,
            _ => return Self::default(),
        };
        Self { field, descending }
    }

    pub fn apply(&self, items: &mut [AppointmentDetails]) {
        match self.field {
            SortField::Patient => items.sort_by(|a, b| a.patient_name().cmp(b.patient_name())),
            SortField::Doctor => items.sort_by(|a, b| a.doctor_name().cmp(b.doctor_name())),
            SortField::ScheduledTime => {
                items.sort_by_key(|a| a.appointment.scheduled_time)
            }
        }
        if self.descending {
            items.reverse();
        }
    }

    pub fn as_param(&self) -> String {
        let key = match self.field {
            SortField::Patient => "patient",
            SortField::Doctor => "doctor",
            SortField::ScheduledTime => "scheduled_time",
        };
        if self.descending { format!("-{}", key) } else { key.to_string() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub page: Option<usize>,
}

// ==============================================================================
// DASHBOARD MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyChart {
    pub labels: Vec<String>,
    pub data: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretaryDashboard {
    pub today_appointments: Vec<AppointmentDetails>,
    pub patients_today: usize,
    pub appointments_today: usize,
    pub new_patients_today: usize,
    pub revenue_today_iqd: i64,
    pub weekly_chart: WeeklyChart,
}

// ==============================================================================
// QUEUE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueueEntry {
    pub number: String,
    pub name: String,
    pub case: String,
    pub time: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DoctorQueueStatus {
    Available,
    OnBreak,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorQueue {
    #[serde(rename = "doctor_id")]
    pub doctor_id: Uuid,
    #[serde(rename = "doctor_name")]
    pub doctor_name: String,
    #[serde(rename = "doctor_specialty")]
    pub doctor_specialty: String,
    pub status: DoctorQueueStatus,
    pub current_patient: Option<QueueEntry>,
    pub waiting: Vec<QueueEntry>,
    pub avg_time: u32,
    pub department: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentPatient {
    pub number: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub doctor_name: String,
    pub wait_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentPatientResponse {
    pub current: Option<CurrentPatient>,
    pub next: Option<CurrentPatient>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallNextQuery {
    pub doctor_id: Option<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("{0}")]
    InvalidTime(String),

    #[error("Cannot change status from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("{}", OVERLAP_MESSAGE)]
    ConflictDetected,

    #[error("Could not assign a queue number, please try again")]
    QueueContention,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(err: serde_json::Error) -> Self {
        AppointmentError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidTime(msg) | AppointmentError::ValidationError(msg) => {
                AppError::ValidationError(msg)
            }
            AppointmentError::InvalidStatusTransition { .. } | AppointmentError::ConflictDetected => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::QueueContention => AppError::Conflict(err.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
