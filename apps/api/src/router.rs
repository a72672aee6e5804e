use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use booking_request_cell::router::booking_request_routes;
use doctor_cell::router::doctor_routes;
use medical_archive_cell::router::archive_routes;
use patient_cell::router::patient_routes;
use prescription_cell::router::prescription_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/bookings", booking_request_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/archives", archive_routes(state))
}
