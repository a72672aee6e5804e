use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::models::ARCHIVE_BODY_LIMIT;

pub fn archive_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_archives).post(handlers::create_archive))
        .route("/{archive_id}", get(handlers::get_archive)
            .put(handlers::update_archive)
            .delete(handlers::delete_archive))
        .layer(DefaultBodyLimit::max(ARCHIVE_BODY_LIMIT))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
