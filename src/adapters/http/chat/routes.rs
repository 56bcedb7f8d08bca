//! Axum router configuration for chat endpoints.

use axum::{routing::get, Router};

use super::handlers::{get_chat, health, list_chats, ChatAppState};

/// Create the chat API router.
///
/// # Routes
///
/// - `GET /chats` - List the current user's chats
/// - `GET /chats/:id` - Get one chat
/// - `GET /health` - Liveness check (no auth)
pub fn chat_routes() -> Router<ChatAppState> {
    Router::new()
        .route("/chats", get(list_chats))
        .route("/chats/:id", get(get_chat))
        .route("/health", get(health))
}
