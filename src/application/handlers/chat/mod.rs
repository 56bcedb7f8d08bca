//! Chat command and query handlers.

mod create_chat;
mod get_chats;
mod join_rooms;
mod send_message;

#[cfg(test)]
pub(crate) mod test_support;

pub use create_chat::{CreateChatCommand, CreateChatHandler, CreateChatResult};
pub use get_chats::GetChatsHandler;
pub use join_rooms::{JoinRoomsCommand, JoinRoomsHandler, JoinRoomsResult};
pub use send_message::{SendMessageCommand, SendMessageHandler};
