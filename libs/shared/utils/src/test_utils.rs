use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub site_url: String,
    pub clinic_utc_offset_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            site_url: "https://clinic.test".to_string(),
            clinic_utc_offset_minutes: 0,
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            site_url: self.site_url.clone(),
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
            storage_bucket: "clinic-media".to_string(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "patient")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn secretary(email: &str) -> Self {
        Self::new(email, "secretary")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "role": user.role },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes as PostgREST would return them, for wiremock bodies.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_row(user_id: &str, email: &str, role: &str, is_approved: bool) -> serde_json::Value {
        json!({
            "id": user_id,
            "email": email,
            "username": email.split('@').next().unwrap_or(email),
            "role": role,
            "is_approved": is_approved,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(doctor_id: &str, user_id: &str, full_name: &str, specialty: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "user_id": user_id,
            "full_name": full_name,
            "specialty": specialty,
            "phone": "+9647700000000",
            "clinic_address": "Karrada, Baghdad",
            "photo_url": null,
            "gender": "female",
            "short_bio": "Internal medicine",
            "available": true,
            "rating": 5.0,
            "consultation_fee": 25000,
            "experience_years": 12,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_response(patient_id: &str, full_name: &str, doctor_id: Option<&str>) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": full_name,
            "date_of_birth": "1990-05-15",
            "gender": "male",
            "mobile": "07700000001",
            "email": null,
            "address": "Baghdad",
            "past_medical_history": null,
            "drug_history": null,
            "investigations": null,
            "bmi": null,
            "hba1c_level": null,
            "blood_glucose_level": null,
            "hypertension": false,
            "heart_disease": false,
            "smoking_history": null,
            "race": null,
            "clinical_notes": null,
            "doctor_id": doctor_id,
            "diabetes_prediction": "Pending",
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        scheduled_time: DateTime<Utc>,
        queue_number: i32,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "scheduled_time": scheduled_time.to_rfc3339(),
            "queue_date": scheduled_time.date_naive().to_string(),
            "queue_number": queue_number,
            "iqd_amount": 0,
            "notes": null,
            "status": status,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert_eq!(app_config.clinic_utc_offset_minutes, 0);
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::secretary("desk@example.com");
        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert!(user_model.is_secretary());
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let token = JwtTestUtils::create_test_token(&TestUser::default(), "test-secret", Some(1));
        assert_eq!(token.split('.').count(), 3);
    }
}
