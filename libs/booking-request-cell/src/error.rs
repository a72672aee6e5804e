use thiserror::Error;

use appointment_cell::models::AppointmentError;
use doctor_cell::models::DoctorError;
use patient_cell::models::PatientError;
use shared_models::error::AppError;

use crate::models::BookingRequestStatus;

#[derive(Error, Debug)]
pub enum BookingRequestError {
    #[error("Booking request not found")]
    NotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("This doctor is not accepting appointments at the moment")]
    DoctorUnavailable,

    #[error("{0}")]
    InvalidTime(String),

    #[error("Booking request is already {from} and cannot be marked {to}")]
    InvalidStatusTransition { from: BookingRequestStatus, to: BookingRequestStatus },

    #[error("Booking request was reviewed by someone else")]
    AlreadyReviewed,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for BookingRequestError {
    fn from(err: anyhow::Error) -> Self {
        BookingRequestError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for BookingRequestError {
    fn from(err: serde_json::Error) -> Self {
        BookingRequestError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<DoctorError> for BookingRequestError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::ProfileNotFound => BookingRequestError::DoctorNotFound,
            DoctorError::ValidationError(msg) => BookingRequestError::ValidationError(msg),
            DoctorError::Forbidden(msg) | DoctorError::DatabaseError(msg) => BookingRequestError::DatabaseError(msg),
        }
    }
}

impl From<BookingRequestError> for AppError {
    fn from(err: BookingRequestError) -> Self {
        match err {
            BookingRequestError::NotFound
            | BookingRequestError::NotificationNotFound
            | BookingRequestError::DoctorNotFound => AppError::NotFound(err.to_string()),
            BookingRequestError::InvalidTime(msg) | BookingRequestError::ValidationError(msg) => {
                AppError::ValidationError(msg)
            }
            BookingRequestError::DoctorUnavailable | BookingRequestError::InvalidStatusTransition { .. } => {
                AppError::ValidationError(err.to_string())
            }
            BookingRequestError::AlreadyReviewed => AppError::Conflict(err.to_string()),
            BookingRequestError::Patient(inner) => inner.into(),
            BookingRequestError::Appointment(inner) => inner.into(),
            BookingRequestError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
