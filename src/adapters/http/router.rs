//! Top-level axum router for the chat server.

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::adapters::websocket::{websocket_router, RealtimeState};

use super::chat::{chat_routes, ChatAppState};
use super::middleware::{auth_middleware, AuthState};

/// Everything the HTTP surface needs.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatAppState,
    pub realtime: RealtimeState,
    pub auth: AuthState,
}

/// Builds the application router.
///
/// # Routes
///
/// - `GET /api/health`
/// - `GET /api/chats`
/// - `GET /api/chats/:id`
/// - `GET /api/realtime` (WebSocket upgrade)
pub fn app_router(state: AppState, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .merge(chat_routes().with_state(state.chat))
        .merge(websocket_router().with_state(state.realtime))
        .layer(from_fn_with_state(state.auth, auth_middleware));

    Router::new()
        .nest("/api", api)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS policy for the given origins. `*` or an empty list allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
