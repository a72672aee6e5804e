use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::services::DoctorService;
use medical_archive_cell::models::{ArchiveType, CreateArchiveRequest};
use medical_archive_cell::services::ArchiveService;
use patient_cell::models::age_on;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::User;
use shared_utils::clock::{query_timestamp, ClinicClock};

use crate::models::{
    normalize_medications, CreatePrescriptionRequest, IssuedPrescription, PrescribableAppointment, Prescription,
    PrescriptionDetails, PrescriptionError, PrescriptionListQuery, UpdatePrescriptionRequest,
};
use crate::services::export;

const APPOINTMENT_SELECT: &str =
    "id,doctor_id,patient_id,scheduled_time,queue_number,patients(id,full_name,date_of_birth),prescriptions(id)";
const DETAILS_SELECT: &str = "*,doctors(full_name,specialty),medications(*)";

fn qr_object_path(prescription_id: Uuid) -> String {
    format!("prescriptions/qrcodes/qr_{}.svg", prescription_id)
}

fn pdf_object_path(prescription_id: Uuid) -> String {
    format!("prescriptions/pdfs/prescription_{}.pdf", prescription_id)
}

pub struct PrescriptionService {
    supabase: Arc<SupabaseClient>,
    doctors: DoctorService,
    archives: ArchiveService,
    clock: ClinicClock,
    site_url: String,
    bucket: String,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            doctors: DoctorService::new(config),
            archives: ArchiveService::new(config),
            clock: ClinicClock::from_config(config),
            site_url: config.site_url.clone(),
            bucket: config.storage_bucket.clone(),
        }
    }

    async fn current_doctor(&self, user: &User, auth_token: &str) -> Result<Doctor, PrescriptionError> {
        Ok(self.doctors.get_doctor_by_user(&user.id, auth_token).await?)
    }

    /// The doctor's non-cancelled appointments of one clinic day, in time order.
    async fn day_appointments(
        &self,
        doctor_id: Uuid,
        instant: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<PrescribableAppointment>, PrescriptionError> {
        let (start, end) = self.clock.day_bounds(self.clock.local_date(instant));
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=neq.cancelled&scheduled_time=gte.{}&scheduled_time=lt.{}&order=scheduled_time.asc,queue_number.asc&select={}",
            doctor_id,
            query_timestamp(start),
            query_timestamp(end),
            APPOINTMENT_SELECT
        );
        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }

    /// First appointment of today still waiting for a prescription.
    pub async fn next_target(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Option<PrescribableAppointment>, PrescriptionError> {
        let doctor = self.current_doctor(user, auth_token).await?;
        let appointments = self.day_appointments(doctor.id, self.clock.now(), auth_token).await?;

        debug!("Doctor {} has {} appointments today", doctor.id, appointments.len());
        Ok(appointments.into_iter().find(|a| !a.has_prescription()))
    }

    async fn get_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<PrescribableAppointment, PrescriptionError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&select={}", appointment_id, APPOINTMENT_SELECT);
        let rows: Vec<PrescribableAppointment> =
            self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        rows.into_iter().next().ok_or(PrescriptionError::AppointmentNotFound)
    }

    async fn insert_medications(
        &self,
        prescription_id: Uuid,
        medications: &[(String, String)],
        auth_token: &str,
    ) -> Result<(), PrescriptionError> {
        if medications.is_empty() {
            return Ok(());
        }

        let rows: Vec<Value> = medications
            .iter()
            .map(|(name, dosage)| {
                json!({
                    "id": Uuid::new_v4(),
                    "prescription_id": prescription_id,
                    "name": name,
                    "dosage": dosage,
                })
            })
            .collect();

        let _: Value = self.supabase.request(
            Method::POST,
            "/rest/v1/medications",
            Some(auth_token),
            Some(Value::Array(rows)),
        ).await?;
        Ok(())
    }

    pub async fn create(
        &self,
        appointment_id: &str,
        request: CreatePrescriptionRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<IssuedPrescription, PrescriptionError> {
        let medications = normalize_medications(&request.medications)?;
        let doctor = self.current_doctor(user, auth_token).await?;
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if appointment.doctor_id != doctor.id {
            return Err(PrescriptionError::Forbidden(
                "Only the appointment's doctor can write its prescription".to_string(),
            ));
        }
        if appointment.has_prescription() {
            return Err(PrescriptionError::ValidationError(
                "This appointment already has a prescription".to_string(),
            ));
        }

        let patient = appointment
            .patient
            .as_ref()
            .ok_or_else(|| PrescriptionError::ValidationError("Appointment has no patient".to_string()))?;
        let date_of_birth = patient.date_of_birth.ok_or_else(|| {
            PrescriptionError::ValidationError("Patient date of birth is required to write a prescription".to_string())
        })?;
        let age = age_on(date_of_birth, self.clock.today());

        let row = json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment.id,
            "doctor_id": doctor.id,
            "patient_full_name": patient.full_name,
            "age": age,
            "instructions": request.instructions,
            "voice_note_url": request.voice_note_url,
            "signature_url": request.signature_url,
            "logo_url": request.logo_url,
            "date_issued": self.clock.now().to_rfc3339(),
        });

        let rows: Vec<Prescription> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/prescriptions",
            Some(auth_token),
            Some(row),
            Some(SupabaseClient::representation_headers()),
        ).await?;
        let prescription = rows
            .into_iter()
            .next()
            .ok_or_else(|| PrescriptionError::DatabaseError("Failed to create prescription".to_string()))?;

        self.insert_medications(prescription.id, &medications, auth_token).await?;

        if request.archive_prescription {
            let archive = CreateArchiveRequest {
                patient_id: Some(patient.id),
                doctor_id: Some(doctor.id),
                title: format!("Prescription for {}", patient.full_name),
                notes: request.instructions.clone(),
                archive_type: ArchiveType::Prescription,
                ..Default::default()
            };
            if let Err(e) = self.archives.create_archive(archive, user, auth_token).await {
                warn!("Prescription {} was not archived: {}", prescription.id, e);
            }
        }

        let mut details = self.get(&prescription.id.to_string(), auth_token).await?;
        self.publish_exports(&mut details, true, auth_token).await;

        let next_appointment_id = self
            .day_appointments(doctor.id, appointment.scheduled_time, auth_token)
            .await?
            .into_iter()
            .find(|a| a.id != appointment.id && a.scheduled_time > appointment.scheduled_time && !a.has_prescription())
            .map(|a| a.id);

        info!(
            "Prescription {} issued by doctor {} for appointment {} with {} medications",
            prescription.id,
            doctor.id,
            appointment.id,
            medications.len()
        );
        Ok(IssuedPrescription { prescription: details, next_appointment_id })
    }

    /// Renders the QR code (when asked) and the PDF, uploads them and stores
    /// their URLs. A failure leaves the matching URL as it was.
    async fn publish_exports(&self, details: &mut PrescriptionDetails, with_qr: bool, auth_token: &str) {
        let prescription_id = details.prescription.id;
        let issued = self.clock.local(details.prescription.date_issued);
        let mut patch = Map::new();

        if with_qr {
            let payload = export::qr_payload(details, issued, &self.site_url);
            match export::render_qr_svg(&payload) {
                Ok(svg) => match self.supabase.upload_object(
                    &self.bucket,
                    &qr_object_path(prescription_id),
                    svg.into_bytes(),
                    "image/svg+xml",
                    Some(auth_token),
                ).await {
                    Ok(url) => {
                        patch.insert("qr_code_url".to_string(), json!(url));
                        details.prescription.qr_code_url = Some(url);
                    }
                    Err(e) => warn!("QR upload failed for prescription {}: {}", prescription_id, e),
                },
                Err(e) => warn!("{}", e),
            }
        }

        match export::render_pdf(details, issued, &self.site_url) {
            Ok(pdf) => match self.supabase.upload_object(
                &self.bucket,
                &pdf_object_path(prescription_id),
                pdf,
                "application/pdf",
                Some(auth_token),
            ).await {
                Ok(url) => {
                    patch.insert("pdf_url".to_string(), json!(url));
                    details.prescription.pdf_url = Some(url);
                }
                Err(e) => warn!("PDF upload failed for prescription {}: {}", prescription_id, e),
            },
            Err(e) => warn!("{}", e),
        }

        if patch.is_empty() {
            return;
        }

        let path = format!("/rest/v1/prescriptions?id=eq.{}", prescription_id);
        let stored: anyhow::Result<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(Value::Object(patch)))
            .await;
        if let Err(e) = stored {
            warn!("Could not store export URLs for prescription {}: {}", prescription_id, e);
        }
    }

    pub async fn list(
        &self,
        query: &PrescriptionListQuery,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        let mut path = "/rest/v1/prescriptions?order=date_issued.desc&select=*,doctors(full_name)".to_string();
        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            path.push_str(&format!("&patient_full_name=ilike.*{}*", urlencoding::encode(q)));
        }

        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }

    pub async fn get(&self, prescription_id: &str, auth_token: &str) -> Result<PrescriptionDetails, PrescriptionError> {
        debug!("Fetching prescription {}", prescription_id);

        let path = format!("/rest/v1/prescriptions?id=eq.{}&select={}", prescription_id, DETAILS_SELECT);
        let rows: Vec<PrescriptionDetails> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        rows.into_iter().next().ok_or(PrescriptionError::NotFound)
    }

    async fn get_owned(
        &self,
        prescription_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<PrescriptionDetails, PrescriptionError> {
        let doctor = self.current_doctor(user, auth_token).await?;
        let details = self.get(prescription_id, auth_token).await?;
        if details.prescription.doctor_id != doctor.id {
            return Err(PrescriptionError::Forbidden(
                "Only the prescribing doctor can change this prescription".to_string(),
            ));
        }
        Ok(details)
    }

    pub async fn update(
        &self,
        prescription_id: &str,
        request: UpdatePrescriptionRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<PrescriptionDetails, PrescriptionError> {
        let medications = request.medications.as_deref().map(normalize_medications).transpose()?;
        let current = self.get_owned(prescription_id, user, auth_token).await?;
        let id = current.prescription.id;

        let mut patch = Map::new();
        if let Some(instructions) = request.instructions {
            patch.insert("instructions".to_string(), json!(instructions));
        }
        if let Some(voice_note_url) = request.voice_note_url {
            patch.insert("voice_note_url".to_string(), json!(voice_note_url));
        }
        if let Some(signature_url) = request.signature_url {
            patch.insert("signature_url".to_string(), json!(signature_url));
        }
        if let Some(logo_url) = request.logo_url {
            patch.insert("logo_url".to_string(), json!(logo_url));
        }
        if !patch.is_empty() {
            let path = format!("/rest/v1/prescriptions?id=eq.{}", id);
            let _: Value = self.supabase.request(Method::PATCH, &path, Some(auth_token), Some(Value::Object(patch))).await?;
        }

        if let Some(medications) = medications {
            let path = format!("/rest/v1/medications?prescription_id=eq.{}", id);
            let _: Value = self.supabase.request(Method::DELETE, &path, Some(auth_token), None).await?;
            self.insert_medications(id, &medications, auth_token).await?;
        }

        let mut details = self.get(&id.to_string(), auth_token).await?;
        self.publish_exports(&mut details, false, auth_token).await;

        info!("Prescription {} updated", id);
        Ok(details)
    }

    /// Removes the row and its medications; stored exports are removed on a best-effort basis.
    pub async fn delete(&self, prescription_id: &str, user: &User, auth_token: &str) -> Result<(), PrescriptionError> {
        let current = self.get_owned(prescription_id, user, auth_token).await?;
        let id = current.prescription.id;

        let path = format!("/rest/v1/medications?prescription_id=eq.{}", id);
        let _: Value = self.supabase.request(Method::DELETE, &path, Some(auth_token), None).await?;

        let path = format!("/rest/v1/prescriptions?id=eq.{}", id);
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;
        if deleted.is_empty() {
            return Err(PrescriptionError::NotFound);
        }

        for object_path in [qr_object_path(id), pdf_object_path(id)] {
            if let Err(e) = self.supabase.delete_object(&self.bucket, &object_path, Some(auth_token)).await {
                if !SupabaseError::is_not_found(&e) {
                    warn!("Could not remove {} from storage: {}", object_path, e);
                }
            }
        }

        info!("Prescription {} deleted", id);
        Ok(())
    }

    pub async fn pdf_bytes(&self, prescription_id: &str, auth_token: &str) -> Result<(Uuid, Vec<u8>), PrescriptionError> {
        let details = self.get(prescription_id, auth_token).await?;
        let issued = self.clock.local(details.prescription.date_issued);
        let pdf = export::render_pdf(&details, issued, &self.site_url)?;
        Ok((details.prescription.id, pdf))
    }

    pub async fn whatsapp_link(&self, prescription_id: &str, auth_token: &str) -> Result<String, PrescriptionError> {
        let details = self.get(prescription_id, auth_token).await?;
        let issued = self.clock.local(details.prescription.date_issued);
        let message = export::whatsapp_message(&details, issued, &self.site_url);
        Ok(export::whatsapp_link(&message))
    }
}
