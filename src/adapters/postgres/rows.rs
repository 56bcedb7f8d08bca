//! Row mapping shared by the chat repository and reader.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::chat::{Chat, Message};
use crate::domain::foundation::{ChatId, DomainError, MessageId, Timestamp, UserId};
use crate::ports::ParticipantInfo;

pub(super) const CHAT_COLUMNS: &str =
    "id, name, participants, is_group, last_message, created_at, updated_at";

pub(super) const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, content, created_at";

pub(super) fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(format!("Failed to get {}: {}", name, e)))
}

fn user_id(raw: String) -> Result<UserId, DomainError> {
    UserId::new(raw).map_err(|e| DomainError::database(format!("Invalid user id: {}", e)))
}

pub(super) fn row_to_chat(row: &PgRow) -> Result<Chat, DomainError> {
    let id: Uuid = column(row, "id")?;
    let name: String = column(row, "name")?;
    let participants: Vec<String> = column(row, "participants")?;
    let is_group: bool = column(row, "is_group")?;
    let last_message: Option<Uuid> = column(row, "last_message")?;
    let created_at: DateTime<Utc> = column(row, "created_at")?;
    let updated_at: DateTime<Utc> = column(row, "updated_at")?;

    let participants = participants
        .into_iter()
        .map(user_id)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Chat::reconstitute(
        ChatId::from_uuid(id),
        name,
        participants,
        is_group,
        last_message.map(MessageId::from_uuid),
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}

pub(super) fn row_to_message(row: &PgRow) -> Result<Message, DomainError> {
    let id: Uuid = column(row, "id")?;
    let chat_id: Uuid = column(row, "chat_id")?;
    let sender_id: String = column(row, "sender_id")?;
    let content: String = column(row, "content")?;
    let created_at: DateTime<Utc> = column(row, "created_at")?;

    Ok(Message {
        id: MessageId::from_uuid(id),
        chat_id: ChatId::from_uuid(chat_id),
        sender_id: user_id(sender_id)?,
        content,
        created_at: Timestamp::from_datetime(created_at),
    })
}

pub(super) fn row_to_participant(row: &PgRow) -> Result<ParticipantInfo, DomainError> {
    let id: String = column(row, "id")?;
    let name: String = column(row, "name")?;
    let photo_url: Option<String> = column(row, "photo_url")?;

    Ok(ParticipantInfo {
        id: user_id(id)?,
        name,
        photo_url,
    })
}
