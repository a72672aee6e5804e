use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{validate_profile_fields, CreateDoctorRequest, Doctor, DoctorError, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Doctors open for appointments, alphabetical. Readable without a session.
    pub async fn list_available(&self, auth_token: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            "/rest/v1/doctors?available=eq.true&order=full_name.asc",
            auth_token,
            None,
        ).await?;

        Ok(rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()?)
    }

    pub async fn get_doctor(&self, doctor_id: &str, auth_token: Option<&str>) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// The doctor profile owned by a signed-in user.
    pub async fn get_doctor_by_user(&self, user_id: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = rows.into_iter().next().ok_or(DoctorError::ProfileNotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        validate_profile_fields(
            request.phone.as_deref(),
            request.rating,
            request.consultation_fee,
            request.experience_years,
        )?;

        if request.full_name.trim().is_empty() || request.specialty.trim().is_empty() {
            return Err(DoctorError::ValidationError("Full name and specialty are required".to_string()));
        }

        let existing_path = format!("/rest/v1/doctors?user_id=eq.{}&select=id", request.user_id);
        let existing: Vec<Value> = self.supabase.request(Method::GET, &existing_path, Some(auth_token), None).await?;
        if !existing.is_empty() {
            return Err(DoctorError::ValidationError("This user already has a doctor profile".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "id": Uuid::new_v4(),
            "user_id": request.user_id,
            "full_name": request.full_name.trim(),
            "specialty": request.specialty.trim(),
            "phone": request.phone,
            "clinic_address": request.clinic_address,
            "photo_url": request.photo_url,
            "gender": request.gender,
            "short_bio": request.short_bio,
            "available": request.available.unwrap_or(true),
            "rating": request.rating.unwrap_or(5.0),
            "consultation_fee": request.consultation_fee,
            "experience_years": request.experience_years,
            "created_at": now,
            "updated_at": now
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            Some(auth_token),
            Some(doctor_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Failed to create doctor profile".to_string()))?;
        let doctor: Doctor = serde_json::from_value(row)?;

        info!("Doctor profile {} created for user {}", doctor.id, doctor.user_id);
        Ok(doctor)
    }

    /// Admins edit any profile; a doctor edits their own, except name and specialty.
    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let existing = self.get_doctor(doctor_id, Some(auth_token)).await?;

        if !user.is_admin() {
            if existing.user_id.to_string() != user.id {
                return Err(DoctorError::Forbidden("You can only edit your own profile".to_string()));
            }
            if request.touches_locked_fields() {
                return Err(DoctorError::Forbidden(
                    "Full name and specialty can only be changed by an administrator".to_string(),
                ));
            }
        }

        validate_profile_fields(
            request.phone.as_deref(),
            request.rating,
            request.consultation_fee,
            request.experience_years,
        )?;

        let mut update_data = Map::new();
        let fields = [
            ("full_name", request.full_name.map(|v| json!(v))),
            ("specialty", request.specialty.map(|v| json!(v))),
            ("phone", request.phone.map(|v| json!(v))),
            ("clinic_address", request.clinic_address.map(|v| json!(v))),
            ("photo_url", request.photo_url.map(|v| json!(v))),
            ("gender", request.gender.map(|v| json!(v))),
            ("short_bio", request.short_bio.map(|v| json!(v))),
            ("available", request.available.map(|v| json!(v))),
            ("rating", request.rating.map(|v| json!(v))),
            ("consultation_fee", request.consultation_fee.map(|v| json!(v))),
            ("experience_years", request.experience_years.map(|v| json!(v))),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                update_data.insert(key.to_string(), value);
            }
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }
}
