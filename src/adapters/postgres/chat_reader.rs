//! PostgreSQL implementation of ChatReader.
//!
//! Loads chats, their history and participant info in three queries per
//! request rather than one per chat.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::chat::Chat;
use crate::domain::foundation::{ChatId, DomainError, UserId};
use crate::ports::{ChatReader, ChatView, MessageView, ParticipantInfo};

use super::rows::{
    db_error, row_to_chat, row_to_message, row_to_participant, CHAT_COLUMNS, MESSAGE_COLUMNS,
};

/// PostgreSQL implementation of ChatReader.
#[derive(Clone)]
pub struct PostgresChatReader {
    pool: PgPool,
}

impl PostgresChatReader {
    /// Creates a new PostgresChatReader.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn assemble(&self, chats: Vec<Chat>) -> Result<Vec<ChatView>, DomainError> {
        if chats.is_empty() {
            return Ok(Vec::new());
        }

        let chat_ids: Vec<Uuid> = chats.iter().map(|c| *c.id().as_uuid()).collect();
        let sql = format!(
            "SELECT {} FROM messages WHERE chat_id = ANY($1) ORDER BY created_at ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let message_rows = sqlx::query(&sql)
            .bind(&chat_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("fetch chat messages", e))?;

        let mut messages: HashMap<ChatId, Vec<MessageView>> = HashMap::new();
        for row in &message_rows {
            let message = row_to_message(row)?;
            messages
                .entry(message.chat_id)
                .or_default()
                .push(MessageView::from(message));
        }

        let mut user_ids: Vec<&str> = chats
            .iter()
            .flat_map(|c| c.participants().iter().map(UserId::as_str))
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let user_rows = sqlx::query("SELECT id, name, photo_url FROM users WHERE id = ANY($1)")
            .bind(&user_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("fetch participants", e))?;
        let users: Vec<ParticipantInfo> = user_rows
            .iter()
            .map(row_to_participant)
            .collect::<Result<_, _>>()?;

        Ok(chats
            .iter()
            .map(|chat| {
                let info = users
                    .iter()
                    .filter(|u| chat.has_participant(&u.id))
                    .cloned()
                    .collect();
                let history = messages.remove(chat.id()).unwrap_or_default();
                ChatView::from_chat(chat, info, history)
            })
            .collect())
    }
}

#[async_trait]
impl ChatReader for PostgresChatReader {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ChatView>, DomainError> {
        let sql = format!(
            "SELECT {} FROM chats WHERE $1 = ANY(participants) ORDER BY updated_at DESC",
            CHAT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("fetch chats for user", e))?;

        let chats = rows.iter().map(row_to_chat).collect::<Result<Vec<_>, _>>()?;
        self.assemble(chats).await
    }

    async fn get_for_user(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<Option<ChatView>, DomainError> {
        let sql = format!(
            "SELECT {} FROM chats WHERE id = $1 AND $2 = ANY(participants)",
            CHAT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(chat_id.as_uuid())
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch chat", e))?;

        let chat = match row {
            Some(row) => row_to_chat(&row)?,
            None => return Ok(None),
        };

        Ok(self.assemble(vec![chat]).await?.into_iter().next())
    }
}
