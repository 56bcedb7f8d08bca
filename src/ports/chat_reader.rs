//! Chat reader port (read side / CQRS queries).
//!
//! Produces the JSON views the chat client consumes, both over REST and as
//! realtime event payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::chat::{Chat, Message};
use crate::domain::foundation::{ChatId, DomainError, MessageId, UserId};

/// Reader port for chat queries.
#[async_trait]
pub trait ChatReader: Send + Sync {
    /// All chats of a user, most recently updated first, each with its full
    /// history in ascending order.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ChatView>, DomainError>;

    /// One chat with its history, only if `user_id` participates.
    async fn get_for_user(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<Option<ChatView>, DomainError>;
}

/// A message as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            timestamp: message.created_at.as_unix_millis(),
        }
    }
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self::from(&message)
    }
}

/// Public profile fields of a chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: UserId,
    pub name: String,
    /// Kept snake_case on the wire, unlike the rest of the view.
    #[serde(rename = "photo_url", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl ParticipantInfo {
    /// Info for a user whose profile could not be loaded.
    pub fn id_only(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            photo_url: None,
        }
    }
}

/// A chat with participants and history, as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: ChatId,
    pub name: String,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub participants_info: Vec<ParticipantInfo>,
    #[serde(default)]
    pub messages: Vec<MessageView>,
    pub is_group: bool,
    #[serde(default)]
    pub last_message: Option<MessageView>,
}

impl ChatView {
    /// Builds a view from the aggregate.
    ///
    /// `participants_info` is reordered to follow the chat's participant
    /// order; participants missing from `info` get id-only entries.
    pub fn from_chat(chat: &Chat, info: Vec<ParticipantInfo>, messages: Vec<MessageView>) -> Self {
        let participants_info = chat
            .participants()
            .iter()
            .map(|id| {
                info.iter()
                    .find(|p| &p.id == id)
                    .cloned()
                    .unwrap_or_else(|| ParticipantInfo::id_only(id.clone()))
            })
            .collect();
        let last_message = messages.last().cloned();

        Self {
            id: *chat.id(),
            name: chat.name().to_string(),
            participants: chat.participants().to_vec(),
            participants_info,
            messages,
            is_group: chat.is_group(),
            last_message,
        }
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn has_message(&self, message_id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn message_view_uses_camel_case_and_millis() {
        let message = Message {
            id: MessageId::new(),
            chat_id: ChatId::new(),
            sender_id: uid("u1"),
            content: "hola".into(),
            created_at: Timestamp::from_unix_millis(1_700_000_000_123),
        };

        let json = serde_json::to_value(MessageView::from(&message)).unwrap();

        assert_eq!(json["senderId"], "u1");
        assert_eq!(json["chatId"], message.chat_id.to_string());
        assert_eq!(json["timestamp"], 1_700_000_000_123_i64);
    }

    #[test]
    fn chat_view_fills_missing_participant_info() {
        let chat = Chat::create(&uid("u1"), vec![uid("u2")], None, false).unwrap();
        let info = vec![ParticipantInfo {
            id: uid("u1"),
            name: "Ana".into(),
            photo_url: Some("/img/ana.png".into()),
        }];

        let view = ChatView::from_chat(&chat, info, Vec::new());

        assert_eq!(view.participants_info.len(), 2);
        assert_eq!(view.participants_info[0], ParticipantInfo::id_only(uid("u2")));
        assert_eq!(view.participants_info[1].name, "Ana");
        assert!(view.last_message.is_none());
    }

    #[test]
    fn participant_photo_keeps_snake_case_key() {
        let info = ParticipantInfo {
            id: uid("u1"),
            name: "Ana".into(),
            photo_url: Some("/img/ana.png".into()),
        };

        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["photo_url"], "/img/ana.png");
        assert!(json.get("photoUrl").is_none());
        assert_eq!(serde_json::from_value::<ParticipantInfo>(json).unwrap(), info);
    }

    #[test]
    fn chat_view_serializes_null_last_message() {
        let chat = Chat::create(&uid("u1"), vec![uid("u2")], None, false).unwrap();
        let json = serde_json::to_value(ChatView::from_chat(&chat, Vec::new(), Vec::new())).unwrap();

        assert!(json["lastMessage"].is_null());
        assert_eq!(json["isGroup"], false);
        assert!(json["participantsInfo"].is_array());
    }
}
