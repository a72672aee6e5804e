use tracing::{debug, instrument};

const MIN_LENGTH: usize = 8;
const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "123456", "12345678", "123456789", "password1", "password123",
    "qwerty", "qwerty123", "abc123", "111111", "123123", "admin", "admin123",
    "letmein", "welcome", "monkey", "dragon", "iloveyou", "sunshine", "football",
    "baseball", "princess", "trustno1", "passw0rd", "1q2w3e4r", "zaq12wsx",
];

/// Registration password rules: minimum length, not all digits, not a common
/// password, not too close to the user's own identifiers.
pub struct PasswordPolicy;

impl PasswordPolicy {
    #[instrument(skip(password, user_attributes))]
    pub fn validate(password: &str, user_attributes: &[(&str, &str)]) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if password.chars().count() < MIN_LENGTH {
            issues.push(format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_LENGTH
            ));
        }

        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            issues.push("This password is entirely numeric.".to_string());
        }

        let lowered = password.to_lowercase();
        if COMMON_PASSWORDS.contains(&lowered.as_str()) {
            issues.push("This password is too common.".to_string());
        }

        for (field, value) in user_attributes {
            if Self::is_too_similar(&lowered, value) {
                issues.push(format!("The password is too similar to the {}.", field));
                break;
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            debug!("Password rejected with {} issue(s)", issues.len());
            Err(issues)
        }
    }

    fn is_too_similar(password: &str, attribute: &str) -> bool {
        let attribute = attribute.to_lowercase();
        if attribute.is_empty() {
            return false;
        }

        // Compare against the whole value and each word of it ("layla.hassan@x.iq" -> layla, hassan, x, iq)
        std::iter::once(attribute.as_str())
            .chain(attribute.split(|c: char| !c.is_alphanumeric()))
            .filter(|part| part.len() >= 3)
            .any(|part| Self::similarity(password, part) >= MAX_SIMILARITY)
    }

    /// 2 * |longest common substring| / (|a| + |b|)
    fn similarity(a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let mut longest = 0usize;
        let mut previous = vec![0usize; b.len() + 1];
        for ca in &a {
            let mut current = vec![0usize; b.len() + 1];
            for (j, cb) in b.iter().enumerate() {
                if ca == cb {
                    current[j + 1] = previous[j] + 1;
                    longest = longest.max(current[j + 1]);
                }
            }
            previous = current;
        }

        (2 * longest) as f64 / (a.len() + b.len()) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        assert!(PasswordPolicy::validate("Tigris-Morning-42", &[("email", "ali@clinic.iq")]).is_ok());
    }

    #[test]
    fn short_and_numeric_are_reported_together() {
        let issues = PasswordPolicy::validate("1234", &[]).unwrap_err();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("too short"));
        assert!(issues[1].contains("entirely numeric"));
    }

    #[test]
    fn common_password_is_rejected() {
        let issues = PasswordPolicy::validate("Password123", &[]).unwrap_err();
        assert_eq!(issues, vec!["This password is too common.".to_string()]);
    }

    #[test]
    fn password_close_to_email_is_rejected() {
        let issues = PasswordPolicy::validate(
            "zainab.k1",
            &[("username", "zainab.k"), ("email", "zainab.k@clinic.iq")],
        )
        .unwrap_err();
        assert_eq!(issues, vec!["The password is too similar to the username.".to_string()]);
    }
}
