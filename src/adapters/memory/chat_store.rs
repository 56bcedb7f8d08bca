//! In-memory chat store for tests and local development.
//!
//! Implements both `ChatRepository` and `ChatReader` over plain vectors.
//! Each gateway operation can be made to fail on demand so callers can
//! exercise their degraded paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::chat::{Chat, Message, NewMessage};
use crate::domain::foundation::{ChatId, DomainError, ErrorCode, MessageId, Timestamp, UserId};
use crate::ports::{ChatReader, ChatRepository, ChatView, MessageView, ParticipantInfo};

/// Gateway operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    FindChatIds,
    FindChat,
    InsertMessage,
    UpdateLastMessage,
    InsertChat,
    FindUsers,
}

#[derive(Default)]
struct Failures {
    find_chat_ids: AtomicBool,
    find_chat: AtomicBool,
    insert_message: AtomicBool,
    update_last_message: AtomicBool,
    insert_chat: AtomicBool,
    find_users: AtomicBool,
}

impl Failures {
    fn flag(&self, op: StoreOperation) -> &AtomicBool {
        match op {
            StoreOperation::FindChatIds => &self.find_chat_ids,
            StoreOperation::FindChat => &self.find_chat,
            StoreOperation::InsertMessage => &self.insert_message,
            StoreOperation::UpdateLastMessage => &self.update_last_message,
            StoreOperation::InsertChat => &self.insert_chat,
            StoreOperation::FindUsers => &self.find_users,
        }
    }

    fn check(&self, op: StoreOperation) -> Result<(), DomainError> {
        if self.flag(op).load(Ordering::SeqCst) {
            return Err(DomainError::database(format!("simulated failure: {:?}", op)));
        }
        Ok(())
    }
}

/// In-memory chat store.
#[derive(Default)]
pub struct InMemoryChatStore {
    users: RwLock<Vec<ParticipantInfo>>,
    chats: RwLock<Vec<Chat>>,
    messages: RwLock<Vec<Message>>,
    failures: Failures,
}

impl InMemoryChatStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user profile.
    pub fn with_user(self, id: &str, name: &str, photo_url: Option<&str>) -> Self {
        if let Ok(id) = UserId::new(id) {
            self.add_user(ParticipantInfo {
                id,
                name: name.to_string(),
                photo_url: photo_url.map(str::to_string),
            });
        }
        self
    }

    pub fn add_user(&self, user: ParticipantInfo) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(user);
    }

    /// Stores a chat directly, bypassing the failure toggles.
    pub fn seed_chat(&self, chat: Chat) {
        self.chats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chat);
    }

    /// Makes `op` fail (or succeed again) on subsequent calls.
    pub fn fail(&self, op: StoreOperation, failing: bool) {
        self.failures.flag(op).store(failing, Ordering::SeqCst);
    }

    // === Test Helpers ===

    pub fn chat(&self, id: &ChatId) -> Option<Chat> {
        self.chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }

    pub fn chat_count(&self) -> usize {
        self.chats.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Messages of a chat in commit order.
    pub fn messages_for(&self, chat_id: &ChatId) -> Vec<Message> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| &m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn users_for(&self, ids: &[UserId]) -> Vec<ParticipantInfo> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect()
    }

    fn view_of(&self, chat: &Chat) -> ChatView {
        let history = self
            .messages_for(chat.id())
            .iter()
            .map(MessageView::from)
            .collect();
        ChatView::from_chat(chat, self.users_for(chat.participants()), history)
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatStore {
    async fn find_chat_ids_by_participant(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ChatId>, DomainError> {
        self.failures.check(StoreOperation::FindChatIds)?;
        Ok(self
            .chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.has_participant(user_id))
            .map(|c| *c.id())
            .collect())
    }

    async fn find_chat_for_participant(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<Option<Chat>, DomainError> {
        self.failures.check(StoreOperation::FindChat)?;
        Ok(self.chat(chat_id).filter(|c| c.has_participant(user_id)))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, DomainError> {
        self.failures.check(StoreOperation::InsertMessage)?;

        let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);

        // Keep created_at monotonic within a chat even if the clock repeats.
        let mut created_at = Timestamp::now();
        if let Some(last) = messages.iter().rev().find(|m| m.chat_id == message.chat_id) {
            if created_at.is_before(&last.created_at) {
                created_at = last.created_at;
            }
        }

        let stored = Message {
            id: MessageId::new(),
            chat_id: message.chat_id,
            sender_id: message.sender_id.clone(),
            content: message.content.as_str().to_string(),
            created_at,
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn update_last_message(
        &self,
        chat_id: &ChatId,
        message_id: &MessageId,
        at: &Timestamp,
    ) -> Result<(), DomainError> {
        self.failures.check(StoreOperation::UpdateLastMessage)?;

        let mut chats = self.chats.write().unwrap_or_else(PoisonError::into_inner);
        match chats.iter_mut().find(|c| c.id() == chat_id) {
            Some(chat) => {
                chat.record_message(*message_id, *at);
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::ChatNotFound,
                format!("Chat not found: {}", chat_id),
            )),
        }
    }

    async fn insert_chat(&self, chat: &Chat) -> Result<(), DomainError> {
        self.failures.check(StoreOperation::InsertChat)?;
        self.seed_chat(chat.clone());
        Ok(())
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<ParticipantInfo>, DomainError> {
        self.failures.check(StoreOperation::FindUsers)?;
        Ok(self.users_for(ids))
    }
}

#[async_trait]
impl ChatReader for InMemoryChatStore {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ChatView>, DomainError> {
        let mut chats: Vec<Chat> = self
            .chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at().cmp(a.updated_at()));

        Ok(chats.iter().map(|c| self.view_of(c)).collect())
    }

    async fn get_for_user(
        &self,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<Option<ChatView>, DomainError> {
        Ok(self
            .chat(chat_id)
            .filter(|c| c.has_participant(user_id))
            .map(|c| self.view_of(&c)))
    }
}
