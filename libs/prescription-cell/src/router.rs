use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn prescription_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_prescriptions))
        .route("/next", get(handlers::next_prescription_target))
        .route("/appointments/{appointment_id}", post(handlers::create_prescription))
        .route("/{prescription_id}", get(handlers::get_prescription)
            .put(handlers::update_prescription)
            .delete(handlers::delete_prescription))

        // Exports
        .route("/{prescription_id}/pdf", get(handlers::download_prescription_pdf))
        .route("/{prescription_id}/whatsapp", get(handlers::prescription_whatsapp_link))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
