//! Chat repository port (write side).
//!
//! The persistence gateway for chats and messages. Implementations own the
//! store-generated fields: message ids and `created_at` are assigned on insert.
//!
//! # Design
//!
//! - **Participant-scoped**: chat lookups for authorization always include
//!   the acting user, so "unknown chat" and "not a member" are indistinguishable
//! - **Append-only messages**: messages are inserted, never updated

use async_trait::async_trait;

use crate::domain::chat::{Chat, Message, NewMessage};
use crate::domain::foundation::{ChatId, DomainError, MessageId, Timestamp, UserId};

use super::ParticipantInfo;

/// Repository port for chat and message persistence.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Ids of every chat `user_id` participates in. Order is unspecified.
    async fn find_chat_ids_by_participant(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ChatId>, DomainError>;

    /// Find a chat by id, only if `user_id` is one of its participants.
    ///
    /// Returns `None` both for unknown chats and for non-members.
    async fn find_chat_for_participant(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<Option<Chat>, DomainError>;

    /// Insert a message atomically and return it with its stored id and time.
    async fn insert_message(&self, message: &NewMessage) -> Result<Message, DomainError>;

    /// Point the chat at its newest message and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// - `ChatNotFound` if the chat doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update_last_message(
        &self,
        chat_id: &ChatId,
        message_id: &MessageId,
        at: &Timestamp,
    ) -> Result<(), DomainError>;

    /// Save a new chat.
    async fn insert_chat(&self, chat: &Chat) -> Result<(), DomainError>;

    /// Batch lookup of participant display info.
    ///
    /// Unknown ids are omitted from the result.
    async fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<ParticipantInfo>, DomainError>;
}
