use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_request_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/", post(handlers::submit_booking_request));

    let protected_routes = Router::new()
        .route("/", get(handlers::list_booking_requests))
        .route("/{request_id}", get(handlers::get_booking_request))
        .route("/{request_id}/confirm", post(handlers::confirm_booking_request))
        .route("/{request_id}/reject", post(handlers::reject_booking_request))

        // Front-desk inbox
        .route("/api/new-requests", get(handlers::new_booking_requests_api))
        .route("/notifications/{notification_id}/read", post(handlers::mark_notification_read))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
