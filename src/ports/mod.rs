//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the chat domain and the outside world. Adapters implement these ports.
//!
//! - `SessionValidator` - bearer token verification
//! - `ChatRepository` - chat/message persistence (write side)
//! - `ChatReader` - chat views for clients (read side)
//! - `BroadcastBus` - room subscriptions and fan-out

mod broadcast_bus;
mod chat_reader;
mod chat_repository;
mod session_validator;

pub use broadcast_bus::{BroadcastBus, BusError, ChatEvent, ConnectionId};
pub use chat_reader::{ChatReader, ChatView, MessageView, ParticipantInfo};
pub use chat_repository::ChatRepository;
pub use session_validator::SessionValidator;
