use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

pub const PHONE_PATTERN: &str = r"^\+?[0-9]*$";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub specialty: String,
    pub phone: Option<String>,
    pub clinic_address: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    pub short_bio: Option<String>,
    pub available: bool,
    pub rating: f32,
    /// Whole Iraqi dinars.
    pub consultation_fee: Option<i32>,
    pub experience_years: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: Uuid,
    pub full_name: String,
    pub specialty: String,
    pub phone: Option<String>,
    pub clinic_address: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    pub short_bio: Option<String>,
    pub available: Option<bool>,
    pub rating: Option<f32>,
    pub consultation_fee: Option<i32>,
    pub experience_years: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub clinic_address: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    pub short_bio: Option<String>,
    pub available: Option<bool>,
    pub rating: Option<f32>,
    pub consultation_fee: Option<i32>,
    pub experience_years: Option<i32>,
}

impl UpdateDoctorRequest {
    /// Fields a doctor may not change on their own profile.
    pub fn touches_locked_fields(&self) -> bool {
        self.full_name.is_some() || self.specialty.is_some()
    }
}

/// Field checks shared by create and update.
pub fn validate_profile_fields(
    phone: Option<&str>,
    rating: Option<f32>,
    consultation_fee: Option<i32>,
    experience_years: Option<i32>,
) -> Result<(), DoctorError> {
    if let Some(phone) = phone {
        let pattern = Regex::new(PHONE_PATTERN)
            .map_err(|e| DoctorError::ValidationError(e.to_string()))?;
        if !pattern.is_match(phone) {
            return Err(DoctorError::ValidationError(
                "Phone number must contain digits only, optionally starting with +".to_string(),
            ));
        }
    }
    if let Some(rating) = rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err(DoctorError::ValidationError("Rating must be between 0 and 5".to_string()));
        }
    }
    if consultation_fee.is_some_and(|fee| fee < 0) {
        return Err(DoctorError::ValidationError("Consultation fee cannot be negative".to_string()));
    }
    if experience_years.is_some_and(|years| years < 0) {
        return Err(DoctorError::ValidationError("Experience years cannot be negative".to_string()));
    }
    Ok(())
}

// Dashboard read models

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientName {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub queue_number: i32,
    pub status: String,
    #[serde(default)]
    pub iqd_amount: i64,
    #[serde(default, rename = "patients")]
    pub patient: Option<PatientName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub id: Uuid,
    pub title: String,
    pub archive_type: String,
    pub is_critical: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "patients")]
    pub patient: Option<PatientName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub mobile: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDashboard {
    pub doctor: Doctor,
    pub recent_archives: Vec<ArchiveSummary>,
    pub archive_count: usize,
    pub prescription_count: usize,
    pub patient_count: usize,
    pub patients_today: usize,
    pub appointments_today: usize,
    pub new_patients_today: usize,
    pub weekly_chart: Vec<ChartPoint>,
    pub todays_appointments: Vec<DoctorAppointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeSummary {
    pub doctors: Vec<Doctor>,
    pub todays_appointments: Vec<DoctorAppointment>,
    pub next_queue_number: Option<i32>,
    pub recent_patients: Vec<PatientRecord>,
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("No doctor profile is linked to this account")]
    ProfileNotFound,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(err: anyhow::Error) -> Self {
        DoctorError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DoctorError {
    fn from(err: serde_json::Error) -> Self {
        DoctorError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::ProfileNotFound => AppError::NotFound(err.to_string()),
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
