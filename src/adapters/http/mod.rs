//! HTTP adapters - REST API and router wiring.

pub mod chat;
pub mod middleware;
mod router;

pub use chat::{chat_routes, ChatAppState};
pub use router::{app_router, cors_layer, AppState};
