use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

/// Ok when the user holds one of `allowed`, otherwise a 403.
pub fn require_role(user: &User, allowed: &[UserRole]) -> Result<UserRole, AppError> {
    match user.clinic_role() {
        Some(role) if allowed.contains(&role) => Ok(role),
        _ => {
            tracing::warn!(
                "User {} with role {:?} denied; requires one of {:?}",
                user.id, user.role, allowed
            );
            Err(AppError::Forbidden(format!(
                "This action requires the {} role",
                allowed
                    .iter()
                    .map(UserRole::as_str)
                    .collect::<Vec<_>>()
                    .join(" or ")
            )))
        }
    }
}

pub fn require_secretary(user: &User) -> Result<(), AppError> {
    require_role(user, &[UserRole::Secretary]).map(|_| ())
}

pub fn require_doctor(user: &User) -> Result<(), AppError> {
    require_role(user, &[UserRole::Doctor]).map(|_| ())
}

/// Doctors and secretaries; admins pass everywhere staff do.
pub fn require_staff(user: &User) -> Result<UserRole, AppError> {
    require_role(user, &[UserRole::Doctor, UserRole::Secretary, UserRole::Admin])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::test_utils::TestUser;

    #[test]
    fn patient_is_not_staff() {
        let patient = TestUser::patient("p@clinic.test").to_user();
        assert_matches!(require_staff(&patient), Err(AppError::Forbidden(_)));
        assert_matches!(require_secretary(&patient), Err(AppError::Forbidden(_)));
    }

    #[test]
    fn secretary_passes_secretary_guard_only() {
        let secretary = TestUser::secretary("s@clinic.test").to_user();
        assert!(require_secretary(&secretary).is_ok());
        assert_matches!(require_doctor(&secretary), Err(AppError::Forbidden(_)));
        assert_eq!(require_staff(&secretary).unwrap(), UserRole::Secretary);
    }

    #[test]
    fn missing_role_is_forbidden() {
        let mut user = TestUser::doctor("d@clinic.test").to_user();
        user.role = None;
        assert_matches!(require_doctor(&user), Err(AppError::Forbidden(msg)) if msg.contains("doctor"));
    }
}
