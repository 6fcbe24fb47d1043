use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Pages
        .route("/", get(super::handlers::page::index))
        .route("/chat/{chat_id}", get(super::handlers::page::chat_page))
        // API endpoints
        .route("/api/chat", post(super::handlers::chat::send_message))
        .route("/api/chat/{chat_id}", delete(super::handlers::chat::delete_chat))
        .route("/api/chat/{chat_id}/stop", post(super::handlers::chat::stop_stream))
        .route(
            "/api/chat/{chat_id}/stream",
            get(super::handlers::stream::resume_stream),
        )
        .route("/api/track", post(super::handlers::track::track_event))
        // Health check
        .route("/health", get(super::handlers::health::health_check))
        .with_state(state)
}
