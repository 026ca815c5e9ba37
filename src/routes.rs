use crate::app::AppState;
use crate::handlers::{chat_handler, health_check, query_handler, search_images_handler};
use axum::{Router, routing::get, routing::post};
use std::sync::Arc;

/// Creates and configures all gateway routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/query", post(query_handler))
        .route("/api/search/images", post(search_images_handler))
        .route("/api/chat", post(chat_handler))
}
