use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed. Keeping the same status is always fine.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if current_status == new_status {
            return Ok(());
        }

        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn validate_appointment_timing(
        &self,
        scheduled_time: DateTime<Utc>,
        current_time: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if scheduled_time < current_time {
            return Err(AppointmentError::InvalidTime(
                "The selected time is in the past. Please choose a future time.".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    #[test]
    fn pending_moves_to_either_terminal_state() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Completed)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn terminal_states_stay_put() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Completed, AppointmentStatus::Pending),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Cancelled, AppointmentStatus::Completed),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Cancelled, AppointmentStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn past_times_rejected() {
        let lifecycle = AppointmentLifecycleService::new();
        let now = Utc::now();
        assert!(lifecycle.validate_appointment_timing(now + Duration::minutes(5), now).is_ok());
        assert_matches!(
            lifecycle.validate_appointment_timing(now - Duration::minutes(5), now),
            Err(AppointmentError::InvalidTime(_))
        );
    }
}
