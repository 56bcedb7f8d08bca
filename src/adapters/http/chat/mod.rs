//! HTTP adapter for chat queries.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, HealthResponse};
pub use handlers::{get_chat, health, list_chats, ChatApiError, ChatAppState};
pub use routes::chat_routes;
