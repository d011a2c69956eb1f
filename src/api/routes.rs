use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Upload bytes never pass through this service; JSON bodies stay small.
const JSON_BODY_LIMIT: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Authentication
        .route("/login", get(handlers::login))
        .route("/logout", get(handlers::logout))
        .route("/callback", get(handlers::callback))
        .route("/session", get(handlers::current_session))
        // Files (owner-scoped)
        .route("/files", get(handlers::list_files))
        .route("/files/stats", get(handlers::file_stats))
        .route(
            "/files/:id",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        // Uploads
        .route("/upload", post(handlers::initiate_upload))
        .route("/upload/callback", post(handlers::upload_callback))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
