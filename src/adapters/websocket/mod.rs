//! WebSocket adapters for realtime chat.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      BroadcastBus                             │
//! │   LocalBroadcastBus (single node) │ RedisBroadcastBus (fleet) │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               │ deliver(room, event)
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        RoomManager                            │
//! │   Room: user:u1        Room: chat:42         Room: chat:77    │
//! │   └── conn-a           ├── conn-a            └── conn-c       │
//! │                        └── conn-b                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - wire protocol frames
//! - [`rooms`] - connection registry and room membership
//! - [`handler`] - axum upgrade handler and per-connection dispatch

pub mod handler;
pub mod messages;
pub mod rooms;

pub use handler::{handle_client_text, websocket_router, ws_handler, HandshakeQuery, RealtimeState};
pub use messages::{
    ClientMessage, ConnectedMessage, CreateChatPayload, ErrorMessage, PongMessage,
    SendMessagePayload, ServerMessage,
};
pub use rooms::{RoomManager, DEFAULT_QUEUE_CAPACITY};
