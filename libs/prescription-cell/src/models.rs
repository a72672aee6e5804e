use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_models::error::AppError;

pub const NO_APPOINTMENTS_TODAY: &str = "No new appointments for today.";

const MEDICATION_NAME_MAX: usize = 200;
const MEDICATION_DOSAGE_MAX: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescribingDoctor {
    pub full_name: String,
    #[serde(default)]
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_full_name: String,
    pub age: i32,
    pub instructions: Option<String>,
    pub voice_note_url: Option<String>,
    pub signature_url: Option<String>,
    pub logo_url: Option<String>,
    pub pdf_url: Option<String>,
    pub qr_code_url: Option<String>,
    pub date_issued: DateTime<Utc>,
    #[serde(default, rename = "doctors", skip_serializing_if = "Option::is_none")]
    pub doctor: Option<PrescribingDoctor>,
}

impl Prescription {
    pub fn doctor_name(&self) -> &str {
        self.doctor.as_ref().map(|d| d.full_name.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub name: String,
    pub dosage: String,
}

/// A prescription read together with its medications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionDetails {
    #[serde(flatten)]
    pub prescription: Prescription,
    #[serde(default)]
    pub medications: Vec<Medication>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
}

/// Trimmed `(name, dosage)` pairs. Rows left completely blank are dropped;
/// a row with only one of the two filled in is an error.
pub fn normalize_medications(inputs: &[MedicationInput]) -> Result<Vec<(String, String)>, PrescriptionError> {
    let mut medications = Vec::new();
    for input in inputs {
        let name = input.name.trim();
        let dosage = input.dosage.trim();
        match (name.is_empty(), dosage.is_empty()) {
            (true, true) => continue,
            (false, true) => {
                return Err(PrescriptionError::ValidationError(format!("Dosage is required for {}", name)));
            }
            (true, false) => {
                return Err(PrescriptionError::ValidationError("Medication name is required".to_string()));
            }
            (false, false) => {}
        }
        if name.chars().count() > MEDICATION_NAME_MAX {
            return Err(PrescriptionError::ValidationError(format!(
                "Medication name must be at most {} characters",
                MEDICATION_NAME_MAX
            )));
        }
        if dosage.chars().count() > MEDICATION_DOSAGE_MAX {
            return Err(PrescriptionError::ValidationError(format!(
                "Dosage must be at most {} characters",
                MEDICATION_DOSAGE_MAX
            )));
        }
        medications.push((name.to_string(), dosage.to_string()));
    }
    Ok(medications)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub voice_note_url: Option<String>,
    #[serde(default)]
    pub signature_url: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub medications: Vec<MedicationInput>,
    #[serde(default)]
    pub archive_prescription: bool,
}

/// Omitted fields are left as they are; `medications`, when present, replaces the whole list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePrescriptionRequest {
    pub instructions: Option<String>,
    pub voice_note_url: Option<String>,
    pub signature_url: Option<String>,
    pub logo_url: Option<String>,
    pub medications: Option<Vec<MedicationInput>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentPatient {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionRef {
    pub id: Uuid,
}

/// Appointment as seen from the prescription desk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescribableAppointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub queue_number: i32,
    #[serde(default, rename = "patients")]
    pub patient: Option<AppointmentPatient>,
    #[serde(default, skip_serializing)]
    pub prescriptions: Vec<PrescriptionRef>,
}

impl PrescribableAppointment {
    pub fn has_prescription(&self) -> bool {
        !self.prescriptions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedPrescription {
    pub prescription: PrescriptionDetails,
    /// The doctor's next appointment of the same day still waiting for a prescription.
    pub next_appointment_id: Option<Uuid>,
}

#[derive(Error, Debug)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Could not render prescription: {0}")]
    RenderError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for PrescriptionError {
    fn from(err: anyhow::Error) -> Self {
        PrescriptionError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for PrescriptionError {
    fn from(err: serde_json::Error) -> Self {
        PrescriptionError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<DoctorError> for PrescriptionError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::ProfileNotFound => {
                PrescriptionError::Forbidden("No doctor profile is linked to this account".to_string())
            }
            DoctorError::Forbidden(msg) => PrescriptionError::Forbidden(msg),
            DoctorError::ValidationError(msg) => PrescriptionError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => PrescriptionError::DatabaseError(msg),
        }
    }
}

impl From<PrescriptionError> for AppError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::NotFound | PrescriptionError::AppointmentNotFound => AppError::NotFound(err.to_string()),
            PrescriptionError::Forbidden(msg) => AppError::Forbidden(msg),
            PrescriptionError::ValidationError(msg) => AppError::ValidationError(msg),
            PrescriptionError::RenderError(msg) => AppError::Internal(msg),
            PrescriptionError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn med(name: &str, dosage: &str) -> MedicationInput {
        MedicationInput { name: name.to_string(), dosage: dosage.to_string() }
    }

    #[test]
    fn blank_rows_are_skipped() {
        let meds = normalize_medications(&[
            med(" Metformin ", "500 mg twice daily"),
            med("", "  "),
            med("Amlodipine", "5 mg"),
        ])
        .unwrap();

        assert_eq!(
            meds,
            vec![
                ("Metformin".to_string(), "500 mg twice daily".to_string()),
                ("Amlodipine".to_string(), "5 mg".to_string()),
            ]
        );
    }

    #[test]
    fn half_filled_rows_are_rejected() {
        assert_matches!(
            normalize_medications(&[med("Metformin", "")]),
            Err(PrescriptionError::ValidationError(msg)) if msg == "Dosage is required for Metformin"
        );
        assert_matches!(
            normalize_medications(&[med("", "5 mg")]),
            Err(PrescriptionError::ValidationError(_))
        );
    }

    #[test]
    fn medication_lengths_are_bounded() {
        assert!(normalize_medications(&[med(&"a".repeat(200), &"b".repeat(255))]).is_ok());
        assert_matches!(
            normalize_medications(&[med(&"a".repeat(201), "5 mg")]),
            Err(PrescriptionError::ValidationError(_))
        );
        assert_matches!(
            normalize_medications(&[med("Metformin", &"b".repeat(256))]),
            Err(PrescriptionError::ValidationError(_))
        );
    }
}
