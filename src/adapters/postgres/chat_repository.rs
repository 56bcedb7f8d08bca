//! PostgreSQL implementation of ChatRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::chat::{Chat, Message, NewMessage};
use crate::domain::foundation::{ChatId, DomainError, ErrorCode, MessageId, Timestamp, UserId};
use crate::ports::{ChatRepository, ParticipantInfo};

use super::rows::{
    db_error, row_to_chat, row_to_message, row_to_participant, CHAT_COLUMNS, MESSAGE_COLUMNS,
};

/// PostgreSQL implementation of ChatRepository.
#[derive(Clone)]
pub struct PostgresChatRepository {
    pool: PgPool,
}

impl PostgresChatRepository {
    /// Creates a new PostgresChatRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PostgresChatRepository {
    async fn find_chat_ids_by_participant(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ChatId>, DomainError> {
        let ids: Vec<(uuid::Uuid,)> =
            sqlx::query_as("SELECT id FROM chats WHERE $1 = ANY(participants)")
                .bind(user_id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("fetch chat ids by participant", e))?;

        Ok(ids.into_iter().map(|(id,)| ChatId::from_uuid(id)).collect())
    }

    async fn find_chat_for_participant(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<Option<Chat>, DomainError> {
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

        row.as_ref().map(row_to_chat).transpose()
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO messages (chat_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(message.chat_id.as_uuid())
            .bind(message.sender_id.as_str())
            .bind(message.content.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("insert message", e))?;

        row_to_message(&row)
    }

    async fn update_last_message(
        &self,
        chat_id: &ChatId,
        message_id: &MessageId,
        at: &Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE chats SET
                last_message = $2,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(chat_id.as_uuid())
        .bind(message_id.as_uuid())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update chat last message", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::ChatNotFound,
                format!("Chat not found: {}", chat_id),
            ));
        }

        Ok(())
    }

    async fn insert_chat(&self, chat: &Chat) -> Result<(), DomainError> {
        let participants: Vec<&str> = chat.participants().iter().map(UserId::as_str).collect();

        sqlx::query(
            r#"
            INSERT INTO chats (
                id, name, participants, is_group, last_message, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(chat.id().as_uuid())
        .bind(chat.name())
        .bind(&participants)
        .bind(chat.is_group())
        .bind(chat.last_message_id().map(|id| *id.as_uuid()))
        .bind(chat.created_at().as_datetime())
        .bind(chat.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert chat", e))?;

        Ok(())
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<ParticipantInfo>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = ids.iter().map(UserId::as_str).collect();

        let rows = sqlx::query("SELECT id, name, photo_url FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("fetch users", e))?;

        rows.iter().map(row_to_participant).collect()
    }
}
