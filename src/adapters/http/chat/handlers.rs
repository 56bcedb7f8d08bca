//! HTTP handlers for chat endpoints.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::chat::GetChatsHandler;
use crate::domain::chat::ChatError;
use crate::domain::foundation::Timestamp;
use crate::ports::ChatReader;

use super::super::middleware::RequireAuth;
use super::dto::{ErrorResponse, HealthResponse};

/// Shared state for chat query endpoints.
#[derive(Clone)]
pub struct ChatAppState {
    pub chat_reader: Arc<dyn ChatReader>,
}

impl ChatAppState {
    pub fn get_chats_handler(&self) -> GetChatsHandler {
        GetChatsHandler::new(self.chat_reader.clone())
    }
}

/// GET /api/chats - All chats of the current user, most recent first
pub async fn list_chats(
    State(state): State<ChatAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ChatApiError> {
    let chats = state.get_chats_handler().list(&user.id).await?;
    Ok(Json(chats))
}

/// GET /api/chats/:id - One chat, if the current user participates
pub async fn get_chat(
    State(state): State<ChatAppState>,
    RequireAuth(user): RequireAuth,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatApiError> {
    let chat = state.get_chats_handler().get(&user.id, &chat_id).await?;
    Ok(Json(chat))
}

/// GET /api/health - Liveness check
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "Chat server running".to_string(),
        timestamp: Timestamp::now().to_rfc3339(),
    })
}

/// API error wrapper that converts ChatError into HTTP responses.
#[derive(Debug)]
pub struct ChatApiError(ChatError);

impl From<ChatError> for ChatApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ChatApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ChatError::MissingToken | ChatError::InvalidToken => StatusCode::UNAUTHORIZED,
            ChatError::PermissionDenied => StatusCode::FORBIDDEN,
            ChatError::NotFound => StatusCode::NOT_FOUND,
            ChatError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ChatError::ChatCreationFailed(_) | ChatError::PersistenceFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if self.0.is_internal() {
            tracing::error!(error = %self.0, "Chat request failed");
        }

        let body = ErrorResponse::new(self.0.code().to_string(), self.0.client_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let response = ChatApiError::from(ChatError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn persistence_failure_maps_to_500() {
        let response = ChatApiError::from(ChatError::persistence("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_maps_to_400() {
        let response =
            ChatApiError::from(ChatError::validation("content", "empty")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
