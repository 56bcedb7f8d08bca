//! In-memory adapters for tests and single-process development.

mod chat_store;

pub use chat_store::{InMemoryChatStore, StoreOperation};
