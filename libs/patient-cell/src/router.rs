use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_patient).get(handlers::list_patients))
        .route("/dashboard", get(handlers::patient_dashboard))
        .route("/{patient_id}", get(handlers::get_patient).put(handlers::update_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
