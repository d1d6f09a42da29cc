//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/services", get(handlers::services))
        .route("/export_kmz", post(handlers::export_kmz))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
