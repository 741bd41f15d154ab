pub mod health;

use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/reports/:id/markdown",
            get(handlers::handle_download_markdown),
        )
        .route("/api/v1/reports/:id/pdf", get(handlers::handle_download_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
