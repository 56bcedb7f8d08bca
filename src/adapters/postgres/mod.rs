//! PostgreSQL adapters - Database implementations for chat ports.
//!
//! - `PostgresChatRepository` - chat and message persistence
//! - `PostgresChatReader` - chat views with history and participant info

mod chat_reader;
mod chat_repository;
mod rows;

pub use chat_reader::PostgresChatReader;
pub use chat_repository::PostgresChatRepository;
