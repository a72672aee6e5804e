use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingRequestError;

pub const NEW_BOOKING_TITLE: &str = "New Patient Booking";

const FULL_NAME_MAX: usize = 100;
const CONTACT_INFO_MAX: usize = 200;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingRequestStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl BookingRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingRequestStatus::Pending => "pending",
            BookingRequestStatus::Confirmed => "confirmed",
            BookingRequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingRequestStatus::Confirmed | BookingRequestStatus::Rejected)
    }

    /// A request is reviewed exactly once.
    pub fn can_transition_to(&self, target: BookingRequestStatus) -> bool {
        use BookingRequestStatus::*;
        matches!((self, target), (Pending, Confirmed) | (Pending, Rejected))
    }

    pub fn ensure_transition(&self, target: BookingRequestStatus) -> Result<(), BookingRequestError> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(BookingRequestError::InvalidStatusTransition { from: *self, to: target })
        }
    }
}

impl fmt::Display for BookingRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedDoctor {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub contact_info: String,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub status: BookingRequestStatus,
    pub appointment_id: Option<Uuid>,
    #[serde(default, rename = "doctors", skip_serializing_if = "Option::is_none")]
    pub doctor: Option<RequestedDoctor>,
}

/// Public booking form. Every field is optional on the wire so that a missing
/// one is reported as a validation message rather than a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitBookingRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// A submission that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidBookingRequest {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub contact_info: String,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
}

fn required_text(value: Option<&str>, label: &str, max: usize) -> Result<String, BookingRequestError> {
    let value = value.map(str::trim).unwrap_or("");
    if value.is_empty() {
        return Err(BookingRequestError::ValidationError(format!("{} is required", label)));
    }
    if value.chars().count() > max {
        return Err(BookingRequestError::ValidationError(format!(
            "{} must be at most {} characters",
            label, max
        )));
    }
    Ok(value.to_string())
}

impl SubmitBookingRequest {
    /// `today` is the clinic-local date, which can differ from the UTC date of `now`.
    pub fn validate(&self, now: DateTime<Utc>, today: NaiveDate) -> Result<ValidBookingRequest, BookingRequestError> {
        let full_name = required_text(self.full_name.as_deref(), "Full name", FULL_NAME_MAX)?;
        let contact_info = required_text(self.contact_info.as_deref(), "Contact information", CONTACT_INFO_MAX)?;
        let date_of_birth = self
            .date_of_birth
            .ok_or_else(|| BookingRequestError::ValidationError("Date of birth is required".to_string()))?;
        let doctor_id = self
            .doctor_id
            .ok_or_else(|| BookingRequestError::ValidationError("Please select a doctor".to_string()))?;
        let scheduled_time = self
            .scheduled_time
            .ok_or_else(|| BookingRequestError::ValidationError("Please choose a time".to_string()))?;

        if date_of_birth > today {
            return Err(BookingRequestError::ValidationError(
                "Date of birth cannot be in the future".to_string(),
            ));
        }
        if scheduled_time < now {
            return Err(BookingRequestError::InvalidTime(
                "The selected time is in the past. Please choose a future time.".to_string(),
            ));
        }

        Ok(ValidBookingRequest {
            full_name,
            date_of_birth,
            contact_info,
            doctor_id,
            scheduled_time,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequestListQuery {
    pub status: Option<BookingRequestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub related_booking_request_id: Option<Uuid>,
}

/// Body of the notification raised for a new online booking. `local_time` is
/// the requested slot on the clinic's clock.
pub fn new_booking_message(full_name: &str, doctor_name: &str, local_time: DateTime<FixedOffset>) -> String {
    format!(
        "{} requested an appointment with Dr. {} on {}.",
        full_name,
        doctor_name,
        local_time.format("%Y-%m-%d %I:%M %p")
    )
}
