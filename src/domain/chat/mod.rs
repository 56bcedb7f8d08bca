//! Chat module - conversations, messages and broadcast rooms.

mod aggregate;
mod errors;
mod message;
mod room;

pub use aggregate::{normalize_participants, Chat, MIN_PARTICIPANTS};
pub use errors::ChatError;
pub use message::{Message, MessageContent, NewMessage};
pub use room::Room;
