//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod chat;

pub use chat::{
    CreateChatCommand, CreateChatHandler, CreateChatResult, GetChatsHandler, JoinRoomsCommand,
    JoinRoomsHandler, JoinRoomsResult, SendMessageCommand, SendMessageHandler,
};
