//! WebSocket upgrade handler for realtime chat connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Authenticate the bearer token (rejected with 401 before any upgrade)
//! 2. Upgrade to WebSocket and register the connection
//! 3. Join the personal room and every chat room
//! 4. Relay room traffic out and dispatch client events in
//! 5. Release every subscription on disconnect

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::adapters::http::middleware::{auth_error_response, bearer_token};
use crate::application::handlers::chat::{
    CreateChatCommand, CreateChatHandler, JoinRoomsCommand, JoinRoomsHandler, SendMessageCommand,
    SendMessageHandler,
};
use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::{BroadcastBus, ChatRepository, ConnectionId, SessionValidator};

use super::{
    messages::{ClientMessage, ConnectedMessage, ServerMessage},
    rooms::RoomManager,
};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct RealtimeState {
    pub rooms: Arc<RoomManager>,
    pub bus: Arc<dyn BroadcastBus>,
    pub validator: Arc<dyn SessionValidator>,
    pub join_rooms: Arc<JoinRoomsHandler>,
    pub send_message: Arc<SendMessageHandler>,
    pub create_chat: Arc<CreateChatHandler>,
}

impl RealtimeState {
    /// Wires the chat handlers over one repository and bus.
    pub fn new(
        rooms: Arc<RoomManager>,
        bus: Arc<dyn BroadcastBus>,
        validator: Arc<dyn SessionValidator>,
        repository: Arc<dyn ChatRepository>,
    ) -> Self {
        Self {
            join_rooms: Arc::new(JoinRoomsHandler::new(repository.clone(), bus.clone())),
            send_message: Arc::new(SendMessageHandler::new(repository.clone(), bus.clone())),
            create_chat: Arc::new(CreateChatHandler::new(repository, bus.clone())),
            rooms,
            bus,
            validator,
        }
    }
}

/// Handshake query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /api/realtime?token=<jwt>` (or `Authorization: Bearer <jwt>`)
pub async fn ws_handler(
    State(state): State<RealtimeState>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let token = query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers));

    let Some(token) = token else {
        tracing::debug!("Realtime handshake without token");
        return auth_error_response(&AuthError::MissingToken);
    };

    let user = match state.validator.validate(token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(error = %e, "Realtime handshake rejected");
            return auth_error_response(&e);
        }
    };

    match ws {
        Some(ws) => ws.on_upgrade(move |socket| handle_socket(socket, user, state)),
        None => (StatusCode::UPGRADE_REQUIRED, "WebSocket upgrade required").into_response(),
    }
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, user: AuthenticatedUser, state: RealtimeState) {
    let (mut sender, mut receiver) = socket.split();

    let connection_id = ConnectionId::new();
    let mut outbound = state.rooms.register(connection_id, user.id.clone()).await;

    let joined = state
        .join_rooms
        .handle(JoinRoomsCommand {
            connection_id,
            user_id: user.id.clone(),
        })
        .await;
    let rooms = match joined {
        Ok(result) => result.rooms,
        Err(e) => {
            tracing::error!(
                user_id = %user.id,
                connection_id = %connection_id,
                error = %e,
                "Failed to join rooms"
            );
            Vec::new()
        }
    };

    tracing::info!(
        user_id = %user.id,
        connection_id = %connection_id,
        rooms = rooms.len(),
        "Realtime client connected"
    );

    state
        .rooms
        .send_to(
            &connection_id,
            ServerMessage::Connected(ConnectedMessage {
                connection_id: connection_id.to_string(),
                user_id: user.id.to_string(),
                rooms: rooms.iter().map(ToString::to_string).collect(),
            }),
        )
        .await;

    // Forward queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(connection_id = %connection_id, "Failed to encode frame: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json)).await {
                tracing::debug!(
                    connection_id = %connection_id,
                    "Send error, closing connection: {}",
                    e
                );
                break;
            }
        }
    });

    // Handle incoming messages from client
    let recv_state = state.clone();
    let recv_user = user.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if let Some(reply) =
                        handle_client_text(&recv_state, &connection_id, &recv_user, &text).await
                    {
                        recv_state.rooms.send_to(&connection_id, reply).await;
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        "Received unsupported binary message"
                    );
                    recv_state
                        .rooms
                        .send_to(&connection_id, ServerMessage::error("Binary frames are not supported"))
                        .await;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // WebSocket protocol ping/pong - handled automatically by axum
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                    break;
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.bus.release(&connection_id).await;

    tracing::info!(
        user_id = %user.id,
        connection_id = %connection_id,
        "Realtime client disconnected"
    );
}

/// Dispatches one client text frame.
///
/// Returns the reply for the originating connection, if any. Room
/// broadcasts go through the bus and are not part of the reply.
pub async fn handle_client_text(
    state: &RealtimeState,
    connection_id: &ConnectionId,
    user: &AuthenticatedUser,
    text: &str,
) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, "Malformed client frame: {}", e);
            return Some(ServerMessage::error("Malformed message"));
        }
    };

    match message {
        ClientMessage::Ping => Some(ServerMessage::pong()),

        ClientMessage::SendMessage(payload) => {
            let result = state
                .send_message
                .handle(SendMessageCommand {
                    sender_id: user.id.clone(),
                    chat_id: payload.chat_id,
                    content: payload.content,
                })
                .await;
            result.err().map(|e| {
                log_operation_error("send_message", connection_id, user, &e);
                ServerMessage::from(&e)
            })
        }

        ClientMessage::CreateChat(payload) => {
            let result = state
                .create_chat
                .handle(CreateChatCommand {
                    connection_id: *connection_id,
                    creator_id: user.id.clone(),
                    participants: payload.participants,
                    name: payload.name,
                    is_group: payload.is_group,
                })
                .await;
            result.err().map(|e| {
                log_operation_error("create_chat", connection_id, user, &e);
                ServerMessage::from(&e)
            })
        }
    }
}

fn log_operation_error(
    operation: &str,
    connection_id: &ConnectionId,
    user: &AuthenticatedUser,
    error: &crate::domain::chat::ChatError,
) {
    if error.is_internal() {
        tracing::error!(
            operation,
            user_id = %user.id,
            connection_id = %connection_id,
            error = %error,
            "Realtime operation failed"
        );
    } else {
        tracing::debug!(
            operation,
            user_id = %user.id,
            connection_id = %connection_id,
            error = %error,
            "Realtime operation rejected"
        );
    }
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<RealtimeState> {
    use axum::routing::get;

    axum::Router::new().route("/realtime", get(ws_handler))
}
