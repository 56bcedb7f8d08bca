//! BroadcastBus port - room-based fan-out of committed chat events.
//!
//! Publishing targets a [`Room`]; every connection subscribed to that room
//! receives one copy. A single-process deployment delivers in memory, a
//! multi-process deployment relays through one shared pub/sub channel.
//!
//! ```text
//! publish(chat:42, receive_message)
//!          │
//!          ▼
//!   ┌─────────────┐      ┌──────────────────────────┐
//!   │ BroadcastBus│ ───▶ │ connections in chat:42    │
//!   └─────────────┘      └──────────────────────────┘
//! ```
//!
//! Only committed data is ever published.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::chat::Room;

use super::{ChatView, MessageView};

/// Server-generated identifier of one live realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Events fanned out to rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was committed to a chat.
    ReceiveMessage(MessageView),

    /// The recipient was added to a newly created chat.
    NewChat(ChatView),
}

impl ChatEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::ReceiveMessage(_) => "receive_message",
            ChatEvent::NewChat(_) => "new_chat",
        }
    }
}

/// Errors that can occur in broadcast bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Redis communication error
    #[error("Redis error: {0}")]
    Redis(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The connection is not registered on this process
    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}

/// Port for room subscriptions and fan-out.
///
/// Implementations must:
/// - Deliver each published event exactly once to every subscribed connection
/// - Preserve publish order per room for a single publisher
/// - Treat subscribing twice to the same room as a no-op
#[async_trait]
pub trait BroadcastBus: Send + Sync {
    /// Fan an event out to every connection subscribed to `room`.
    async fn publish(&self, room: &Room, event: ChatEvent) -> Result<(), BusError>;

    /// Subscribe a live connection to `room`.
    async fn subscribe(&self, room: Room, connection: &ConnectionId) -> Result<(), BusError>;

    /// Release every subscription held by `connection`.
    async fn release(&self, connection: &ConnectionId);
}
