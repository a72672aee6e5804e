use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_models::error::AppError;

pub const DIABETES_PREDICTION_PENDING: &str = "Pending";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub past_medical_history: Option<String>,
    pub drug_history: Option<String>,
    pub investigations: Option<String>,
    pub bmi: Option<f32>,
    pub hba1c_level: Option<f32>,
    pub blood_glucose_level: Option<f32>,
    #[serde(default)]
    pub hypertension: bool,
    #[serde(default)]
    pub heart_disease: bool,
    pub smoking_history: Option<String>,
    pub race: Option<String>,
    pub clinical_notes: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub diabetes_prediction: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.map(|dob| age_on(dob, today))
    }
}

/// Whole years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// A patient together with the age computed against the clinic's today.
#[derive(Debug, Clone, Serialize)]
pub struct PatientProfile {
    #[serde(flatten)]
    pub patient: Patient,
    pub age: Option<u32>,
}

impl PatientProfile {
    pub fn new(patient: Patient, today: NaiveDate) -> Self {
        let age = patient.age_on(today);
        Self { patient, age }
    }
}

/// Every field a patient form can carry. Which of them are honoured depends
/// on the role submitting it; see [`PatientForm::to_row`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientForm {
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub past_medical_history: Option<String>,
    pub drug_history: Option<String>,
    pub investigations: Option<String>,
    pub bmi: Option<f32>,
    pub hba1c_level: Option<f32>,
    pub blood_glucose_level: Option<f32>,
    pub hypertension: Option<bool>,
    pub heart_disease: Option<bool>,
    pub smoking_history: Option<String>,
    pub race: Option<String>,
    pub clinical_notes: Option<String>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// Full clinical record, filled in by doctors.
    Clinical,
    /// Front-desk intake: name, date of birth, address and assigned doctor.
    Reception,
}

impl PatientForm {
    pub fn validate(&self, kind: FormKind, creating: bool) -> Result<(), PatientError> {
        if creating && self.full_name.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(PatientError::ValidationError("Full name is required".to_string()));
        }
        if let Some(name) = &self.full_name {
            if name.trim().is_empty() {
                return Err(PatientError::ValidationError("Full name cannot be blank".to_string()));
            }
        }
        if creating && kind == FormKind::Reception && self.doctor_id.is_none() {
            return Err(PatientError::ValidationError("Please select a doctor".to_string()));
        }
        if kind == FormKind::Clinical {
            for (label, value) in [
                ("BMI", self.bmi),
                ("HbA1c level", self.hba1c_level),
                ("Blood glucose level", self.blood_glucose_level),
            ] {
                if value.is_some_and(|v| v < 0.0) {
                    return Err(PatientError::ValidationError(format!("{} cannot be negative", label)));
                }
            }
        }
        Ok(())
    }

    /// PostgREST row with only the fields `kind` may write.
    pub fn to_row(&self, kind: FormKind) -> Map<String, Value> {
        let mut row = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                row.insert(key.to_string(), value);
            }
        };

        put("full_name", self.full_name.as_deref().map(|n| json!(n.trim())));
        put("date_of_birth", self.date_of_birth.map(|d| json!(d)));
        put("address", self.address.as_ref().map(|v| json!(v)));
        put("doctor_id", self.doctor_id.map(|v| json!(v)));

        if kind == FormKind::Clinical {
            put("gender", self.gender.as_ref().map(|v| json!(v)));
            put("mobile", self.mobile.as_ref().map(|v| json!(v)));
            put("email", self.email.as_ref().map(|v| json!(v.trim().to_lowercase())));
            put("past_medical_history", self.past_medical_history.as_ref().map(|v| json!(v)));
            put("drug_history", self.drug_history.as_ref().map(|v| json!(v)));
            put("investigations", self.investigations.as_ref().map(|v| json!(v)));
            put("bmi", self.bmi.map(|v| json!(v)));
            put("hba1c_level", self.hba1c_level.map(|v| json!(v)));
            put("blood_glucose_level", self.blood_glucose_level.map(|v| json!(v)));
            put("hypertension", self.hypertension.map(|v| json!(v)));
            put("heart_disease", self.heart_disease.map(|v| json!(v)));
            put("smoking_history", self.smoking_history.as_ref().map(|v| json!(v)));
            put("race", self.race.as_ref().map(|v| json!(v)));
            put("clinical_notes", self.clinical_notes.as_ref().map(|v| json!(v)));
        }

        row
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    pub q: Option<String>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorName {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientAppointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub queue_number: i32,
    pub status: String,
    #[serde(default, rename = "doctors")]
    pub doctor: Option<DoctorName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDashboard {
    pub patient: PatientProfile,
    pub appointments: Vec<PatientAppointment>,
}

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient profile not found for this account")]
    ProfileNotFound,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for PatientError {
    fn from(err: anyhow::Error) -> Self {
        PatientError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for PatientError {
    fn from(err: serde_json::Error) -> Self {
        PatientError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<DoctorError> for PatientError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::ProfileNotFound => {
                PatientError::ValidationError("No doctor profile is linked to this account".to_string())
            }
            DoctorError::Forbidden(msg) => PatientError::Forbidden(msg),
            DoctorError::ValidationError(msg) => PatientError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => PatientError::DatabaseError(msg),
        }
    }
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound | PatientError::ProfileNotFound => AppError::NotFound(err.to_string()),
            PatientError::Forbidden(msg) => AppError::Forbidden(msg),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
