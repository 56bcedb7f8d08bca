//! Chat queries - list a user's chats and fetch one chat.

use std::sync::Arc;

use crate::domain::chat::ChatError;
use crate::domain::foundation::{ChatId, UserId};
use crate::ports::{ChatReader, ChatView};

/// Query handler over the chat read model.
pub struct GetChatsHandler {
    reader: Arc<dyn ChatReader>,
}

impl GetChatsHandler {
    pub fn new(reader: Arc<dyn ChatReader>) -> Self {
        Self { reader }
    }

    /// All chats of `user_id`, most recently updated first.
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<ChatView>, ChatError> {
        Ok(self.reader.list_for_user(user_id).await?)
    }

    /// One chat, if `user_id` participates. Malformed ids are not found.
    pub async fn get(&self, user_id: &UserId, chat_id: &str) -> Result<ChatView, ChatError> {
        let chat_id: ChatId = chat_id.parse().map_err(|_| ChatError::NotFound)?;
        self.reader
            .get_for_user(&chat_id, user_id)
            .await?
            .ok_or(ChatError::NotFound)
    }
}
