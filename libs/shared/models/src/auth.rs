use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Clinic role: `app_metadata.role`, then `user_metadata.role`, then the bare `role` claim.
    pub fn clinic_role(&self) -> Option<String> {
        let from_metadata = |meta: &Option<serde_json::Value>| {
            meta.as_ref()
                .and_then(|m| m.get("role"))
                .and_then(|r| r.as_str())
                .map(str::to_string)
        };

        from_metadata(&self.app_metadata)
            .or_else(|| from_metadata(&self.user_metadata))
            .or_else(|| self.role.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Doctor,
    Secretary,
    Patient,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Doctor => "doctor",
            UserRole::Secretary => "secretary",
            UserRole::Patient => "patient",
            UserRole::Admin => "admin",
        }
    }

    /// Staff accounts wait for an administrator before they can sign in.
    pub fn requires_approval(&self) -> bool {
        matches!(self, UserRole::Doctor | UserRole::Secretary)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "doctor" => Ok(UserRole::Doctor),
            "secretary" => Ok(UserRole::Secretary),
            "patient" => Ok(UserRole::Patient),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn clinic_role(&self) -> Option<UserRole> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.clinic_role() == Some(role)
    }

    pub fn is_doctor(&self) -> bool {
        self.has_role(UserRole::Doctor)
    }

    pub fn is_secretary(&self) -> bool {
        self.has_role(UserRole::Secretary)
    }

    pub fn is_patient(&self) -> bool {
        self.has_role(UserRole::Patient)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }

    pub fn is_staff(&self) -> bool {
        matches!(
            self.clinic_role(),
            Some(UserRole::Doctor | UserRole::Secretary | UserRole::Admin)
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(role: Option<&str>, app: Option<serde_json::Value>, user: Option<serde_json::Value>) -> JwtClaims {
        JwtClaims {
            sub: "u1".into(),
            exp: None,
            email: None,
            role: role.map(str::to_string),
            app_metadata: app,
            user_metadata: user,
            aud: None,
            iat: None,
        }
    }

    #[test]
    fn clinic_role_prefers_app_metadata() {
        let c = claims(
            Some("authenticated"),
            Some(json!({"role": "secretary"})),
            Some(json!({"role": "patient"})),
        );
        assert_eq!(c.clinic_role().as_deref(), Some("secretary"));
    }

    #[test]
    fn clinic_role_falls_back_to_claim() {
        let c = claims(Some("doctor"), None, Some(json!({})));
        assert_eq!(c.clinic_role().as_deref(), Some("doctor"));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Doctor".parse::<UserRole>(), Ok(UserRole::Doctor));
        assert!("nurse".parse::<UserRole>().is_err());
        assert!(UserRole::Secretary.requires_approval());
        assert!(!UserRole::Patient.requires_approval());
    }
}
