use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/queue", get(handlers::queue_display));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment).get(handlers::list_appointments))
        .route("/secretary/dashboard", get(handlers::secretary_dashboard))
        .route("/{appointment_id}", get(handlers::get_appointment)
            .put(handlers::update_appointment)
            .delete(handlers::delete_appointment))
        .route("/{appointment_id}/ticket", get(handlers::appointment_ticket))

        // Queue desk
        .route("/api/queue-number", get(handlers::queue_number_api))
        .route("/api/call-next", post(handlers::call_next))
        .route("/api/current-patient", get(handlers::current_patient_api))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
