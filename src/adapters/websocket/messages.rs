//! WebSocket message types for realtime chat.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! - Server → Client: handshake ack, chat events, errors, pongs
//! - Client → Server: send/create requests, pings

use serde::{Deserialize, Serialize};

use crate::domain::chat::ChatError;
use crate::domain::foundation::Timestamp;
use crate::ports::{ChatEvent, ChatView, MessageView};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection authenticated and subscribed.
    Connected(ConnectedMessage),

    /// A message was committed to one of the connection's chats.
    ReceiveMessage(MessageView),

    /// The user was added to a new chat.
    NewChat(ChatView),

    /// A request from this connection failed.
    Error(ErrorMessage),

    /// Heartbeat response.
    Pong(PongMessage),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            message: message.into(),
            code: None,
        })
    }

    pub fn pong() -> Self {
        ServerMessage::Pong(PongMessage {
            timestamp: Timestamp::now().as_unix_millis(),
        })
    }
}

impl From<ChatEvent> for ServerMessage {
    fn from(event: ChatEvent) -> Self {
        match event {
            ChatEvent::ReceiveMessage(message) => ServerMessage::ReceiveMessage(message),
            ChatEvent::NewChat(chat) => ServerMessage::NewChat(chat),
        }
    }
}

impl From<&ChatError> for ServerMessage {
    fn from(err: &ChatError) -> Self {
        ServerMessage::Error(ErrorMessage {
            message: err.client_message(),
            code: Some(err.code().to_string()),
        })
    }
}

/// Sent once the handshake succeeded and rooms were joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub connection_id: String,
    pub user_id: String,
    pub rooms: Vec<String>,
}

/// Error message sent to the originating connection only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Heartbeat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongMessage {
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Post a message to a chat.
    SendMessage(SendMessagePayload),

    /// Create a private or group chat.
    CreateChat(CreateChatPayload),

    /// Heartbeat request.
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub chat_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatPayload {
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}
