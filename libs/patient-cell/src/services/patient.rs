use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{User, UserRole};
use shared_utils::clock::ClinicClock;

use crate::models::{
    FormKind, Patient, PatientAppointment, PatientDashboard, PatientError, PatientForm, PatientProfile,
    PatientSearchQuery, DIABETES_PREDICTION_PENDING,
};

pub struct PatientService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    clock: ClinicClock,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            clock: ClinicClock::from_config(config),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Which form a role fills in. Patients have no write access to the registry.
    pub fn form_kind(user: &User) -> Result<FormKind, PatientError> {
        match user.clinic_role() {
            Some(UserRole::Doctor) | Some(UserRole::Admin) => Ok(FormKind::Clinical),
            Some(UserRole::Secretary) => Ok(FormKind::Reception),
            _ => Err(PatientError::Forbidden(
                "Only doctors and secretaries can manage patients".to_string(),
            )),
        }
    }

    pub async fn create_patient(
        &self,
        mut form: PatientForm,
        user: &User,
        auth_token: &str,
    ) -> Result<PatientProfile, PatientError> {
        let kind = Self::form_kind(user)?;

        if user.is_doctor() && form.doctor_id.is_none() {
            let doctor = self
                .doctors
                .get_doctor_by_user(&user.id, auth_token)
                .await?;
            form.doctor_id = Some(doctor.id);
        }

        form.validate(kind, true)?;

        let patient = self.insert(form.to_row(kind), auth_token).await?;

        info!("Patient {} registered by {} ({:?})", patient.patient.id, user.id, kind);
        Ok(patient)
    }

    /// Front-desk record for someone who booked online. The contact number they
    /// left is kept as the patient's mobile.
    pub async fn register_from_booking(
        &self,
        form: PatientForm,
        auth_token: &str,
    ) -> Result<PatientProfile, PatientError> {
        form.validate(FormKind::Reception, true)?;

        let mut row = form.to_row(FormKind::Reception);
        if let Some(mobile) = form.mobile.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            row.insert("mobile".to_string(), json!(mobile));
        }

        let patient = self.insert(row, auth_token).await?;
        info!("Patient {} registered from an online booking", patient.patient.id);
        Ok(patient)
    }

    async fn insert(&self, mut row: Map<String, Value>, auth_token: &str) -> Result<PatientProfile, PatientError> {
        row.insert("id".to_string(), json!(Uuid::new_v4()));
        row.insert("diabetes_prediction".to_string(), json!(DIABETES_PREDICTION_PENDING));
        row.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(auth_token),
            Some(Value::Object(row)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create patient".to_string()))?;
        let patient: Patient = serde_json::from_value(row)?;
        Ok(PatientProfile::new(patient, self.today()))
    }

    pub async fn get_patient(&self, patient_id: &str, auth_token: &str) -> Result<PatientProfile, PatientError> {
        debug!("Fetching patient {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;
        let patient: Patient = serde_json::from_value(row)?;
        Ok(PatientProfile::new(patient, self.today()))
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        form: PatientForm,
        user: &User,
        auth_token: &str,
    ) -> Result<PatientProfile, PatientError> {
        let kind = Self::form_kind(user)?;
        form.validate(kind, false)?;

        let row = form.to_row(kind);
        if row.is_empty() {
            return self.get_patient(patient_id, auth_token).await;
        }

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(row)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;
        let patient: Patient = serde_json::from_value(row)?;

        info!("Patient {} updated by {}", patient.id, user.id);
        Ok(PatientProfile::new(patient, self.today()))
    }

    /// Registry ordered by name, optionally narrowed by a case-insensitive name match.
    pub async fn list_patients(
        &self,
        query: &PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<PatientProfile>, PatientError> {
        let mut path = String::from("/rest/v1/patients?order=full_name.asc");
        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            path.push_str(&format!("&full_name=ilike.*{}*", urlencoding::encode(q)));
        }
        if let Some(doctor_id) = query.doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let today = self.today();

        rows.into_iter()
            .map(|row| {
                let patient: Patient = serde_json::from_value(row)?;
                Ok(PatientProfile::new(patient, today))
            })
            .collect()
    }

    /// Profile and visit history for the signed-in patient, matched on email.
    pub async fn dashboard_for(&self, user: &User, auth_token: &str) -> Result<PatientDashboard, PatientError> {
        let email = user
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .ok_or(PatientError::ProfileNotFound)?;
        let path = format!("/rest/v1/patients?email=eq.{}&limit=1", urlencoding::encode(&email));
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = rows.into_iter().next().ok_or(PatientError::ProfileNotFound)?;
        let patient: Patient = serde_json::from_value(row)?;

        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=scheduled_time.desc&select=*,doctors(full_name)",
            patient.id
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<PatientAppointment>, _>>()?;

        Ok(PatientDashboard {
            patient: PatientProfile::new(patient, self.today()),
            appointments,
        })
    }
}
