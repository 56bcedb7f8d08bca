//! SendMessageHandler - persists a chat message and relays it to the room.
//!
//! Order of effects:
//! 1. membership check (nothing happens for non-members)
//! 2. insert the message
//! 3. publish `receive_message` to `chat:<id>`
//! 4. best-effort update of the chat's last-message pointer
//!
//! Steps 2 to 4 run under a per-chat lock, so concurrent sends to one chat
//! are published in commit order. The lock is local to this process: with
//! the Redis bus, sends to the same chat handled by different servers can
//! still be published out of commit order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::chat::{ChatError, Message, MessageContent, NewMessage, Room};
use crate::domain::foundation::{ChatId, UserId};
use crate::ports::{BroadcastBus, ChatEvent, ChatRepository, MessageView};

/// Command to send a message to a chat.
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub sender_id: UserId,
    /// Raw chat id as received from the client.
    pub chat_id: String,
    pub content: String,
}

/// One async lock per chat with a send in flight.
#[derive(Default)]
struct ChatLocks {
    locks: Mutex<HashMap<ChatId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatLocks {
    fn get(&self, chat_id: &ChatId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(*chat_id)
            .or_default()
            .clone()
    }

    /// Drops the chat's entry once no other send holds or awaits it.
    fn release(&self, chat_id: &ChatId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // the map's copy plus ours
        if Arc::strong_count(&lock) == 2 {
            locks.remove(chat_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Handler for relaying chat messages.
pub struct SendMessageHandler {
    repository: Arc<dyn ChatRepository>,
    bus: Arc<dyn BroadcastBus>,
    ordering: ChatLocks,
}

impl SendMessageHandler {
    pub fn new(repository: Arc<dyn ChatRepository>, bus: Arc<dyn BroadcastBus>) -> Self {
        Self {
            repository,
            bus,
            ordering: ChatLocks::default(),
        }
    }

    pub async fn handle(&self, cmd: SendMessageCommand) -> Result<Message, ChatError> {
        let content = MessageContent::new(cmd.content)?;

        // Malformed ids can't name a chat the sender belongs to.
        let chat_id: ChatId = cmd
            .chat_id
            .trim()
            .parse()
            .map_err(|_| ChatError::PermissionDenied)?;

        let chat = self
            .repository
            .find_chat_for_participant(&chat_id, &cmd.sender_id)
            .await?;
        if chat.is_none() {
            tracing::debug!(
                user_id = %cmd.sender_id,
                chat_id = %chat_id,
                "Rejected message from non-participant"
            );
            return Err(ChatError::PermissionDenied);
        }

        let lock = self.ordering.get(&chat_id);
        let result = {
            let _ordered = lock.lock().await;
            self.commit_and_publish(chat_id, cmd.sender_id, content).await
        };
        self.ordering.release(&chat_id, lock);
        result
    }

    async fn commit_and_publish(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        content: MessageContent,
    ) -> Result<Message, ChatError> {
        let message = self
            .repository
            .insert_message(&NewMessage {
                chat_id,
                sender_id: sender_id.clone(),
                content,
            })
            .await?;

        let room = Room::chat(chat_id);
        let event = ChatEvent::ReceiveMessage(MessageView::from(&message));
        if let Err(e) = self.bus.publish(&room, event).await {
            tracing::error!(
                chat_id = %chat_id,
                message_id = %message.id,
                room = %room,
                error = %e,
                "Failed to broadcast committed message"
            );
        }

        if let Err(e) = self
            .repository
            .update_last_message(&chat_id, &message.id, &message.created_at)
            .await
        {
            tracing::warn!(
                chat_id = %chat_id,
                message_id = %message.id,
                error = %e,
                "Failed to update chat last message"
            );
        }

        tracing::debug!(
            user_id = %sender_id,
            chat_id = %chat_id,
            message_id = %message.id,
            "Message relayed"
        );

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::adapters::memory::{InMemoryChatStore, StoreOperation};
    use crate::application::handlers::chat::test_support::{chat_of, uid, RecordingBus};
    use crate::domain::chat::Chat;
    use crate::domain::foundation::{DomainError, MessageId, Timestamp};
    use crate::ports::ParticipantInfo;

    fn handler(store: &Arc<InMemoryChatStore>, bus: &Arc<RecordingBus>) -> SendMessageHandler {
        SendMessageHandler::new(store.clone(), bus.clone())
    }

    fn cmd(sender: &str, chat_id: impl ToString, content: &str) -> SendMessageCommand {
        SendMessageCommand {
            sender_id: uid(sender),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn participant_message_is_stored_broadcast_and_recorded() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let chat = chat_of("u1", &["u2"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);

        let message = handler(&store, &bus)
            .handle(cmd("u1", chat_id, "hola"))
            .await
            .unwrap();

        assert_eq!(store.messages_for(&chat_id), vec![message.clone()]);

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, Room::chat(chat_id));
        match &published[0].1 {
            ChatEvent::ReceiveMessage(view) => {
                assert_eq!(view.id, message.id);
                assert_eq!(view.content, "hola");
                assert_eq!(view.sender_id, uid("u1"));
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert_eq!(store.chat(&chat_id).unwrap().last_message_id(), Some(&message.id));
    }

    #[tokio::test]
    async fn non_participant_is_denied_without_side_effects() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let chat = chat_of("u1", &["u2", "u3"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);

        let result = handler(&store, &bus).handle(cmd("u4", chat_id, "hi")).await;

        assert_eq!(result, Err(ChatError::PermissionDenied));
        assert_eq!(store.message_count(), 0);
        assert!(bus.published().is_empty());
        assert!(store.chat(&chat_id).unwrap().last_message_id().is_none());
    }

    #[tokio::test]
    async fn unknown_and_malformed_chat_ids_are_denied() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let handler = handler(&store, &bus);

        assert_eq!(
            handler.handle(cmd("u1", ChatId::new(), "hi")).await,
            Err(ChatError::PermissionDenied)
        );
        assert_eq!(
            handler.handle(cmd("u1", "not-a-chat", "hi")).await,
            Err(ChatError::PermissionDenied)
        );
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn blank_content_is_rejected_before_anything_else() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let chat = chat_of("u1", &["u2"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);

        let result = handler(&store, &bus).handle(cmd("u1", chat_id, "   ")).await;

        assert!(matches!(result, Err(ChatError::ValidationFailed { .. })));
        assert_eq!(store.message_count(), 0);
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn insert_failure_is_a_persistence_error_without_broadcast() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let chat = chat_of("u1", &["u2"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);
        store.fail(StoreOperation::InsertMessage, true);

        let result = handler(&store, &bus).handle(cmd("u1", chat_id, "hi")).await;

        assert!(matches!(result, Err(ChatError::PersistenceFailure(_))));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn metadata_failure_still_delivers() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let chat = chat_of("u1", &["u2"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);
        store.fail(StoreOperation::UpdateLastMessage, true);

        let result = handler(&store, &bus).handle(cmd("u2", chat_id, "still here")).await;

        assert!(result.is_ok());
        assert_eq!(bus.published().len(), 1);
        assert_eq!(store.message_count(), 1);
    }

    #[tokio::test]
    async fn bus_failure_keeps_the_message() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::failing());
        let chat = chat_of("u1", &["u2"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);

        let message = handler(&store, &bus)
            .handle(cmd("u1", chat_id, "persisted"))
            .await
            .unwrap();

        assert_eq!(store.messages_for(&chat_id), vec![message]);
    }

    /// Commits like the wrapped store, then stalls before returning when the
    /// content matches, widening the gap between commit and publish.
    struct StallAfterCommit {
        inner: Arc<InMemoryChatStore>,
        stalled_content: &'static str,
    }

    #[async_trait::async_trait]
    impl ChatRepository for StallAfterCommit {
        async fn find_chat_ids_by_participant(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<ChatId>, DomainError> {
            self.inner.find_chat_ids_by_participant(user_id).await
        }

        async fn find_chat_for_participant(
            &self,
            chat_id: &ChatId,
            user_id: &UserId,
        ) -> Result<Option<Chat>, DomainError> {
            self.inner.find_chat_for_participant(chat_id, user_id).await
        }

        async fn insert_message(&self, message: &NewMessage) -> Result<Message, DomainError> {
            let committed = self.inner.insert_message(message).await?;
            if committed.content == self.stalled_content {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Ok(committed)
        }

        async fn update_last_message(
            &self,
            chat_id: &ChatId,
            message_id: &MessageId,
            at: &Timestamp,
        ) -> Result<(), DomainError> {
            self.inner.update_last_message(chat_id, message_id, at).await
        }

        async fn insert_chat(&self, chat: &Chat) -> Result<(), DomainError> {
            self.inner.insert_chat(chat).await
        }

        async fn find_users_by_ids(
            &self,
            ids: &[UserId],
        ) -> Result<Vec<ParticipantInfo>, DomainError> {
            self.inner.find_users_by_ids(ids).await
        }
    }

    #[tokio::test]
    async fn concurrent_sends_publish_in_commit_order() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let chat = chat_of("u1", &["u2"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);
        let handler = Arc::new(SendMessageHandler::new(
            Arc::new(StallAfterCommit {
                inner: store.clone(),
                stalled_content: "first",
            }),
            bus.clone(),
        ));

        let slow = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.handle(cmd("u1", chat_id, "first")).await })
        };
        // let "first" commit and start stalling
        tokio::time::sleep(Duration::from_millis(20)).await;
        handler.handle(cmd("u2", chat_id, "second")).await.unwrap();
        slow.await.unwrap().unwrap();

        let committed: Vec<String> = store
            .messages_for(&chat_id)
            .into_iter()
            .map(|m| m.content)
            .collect();
        let published: Vec<String> = bus
            .published()
            .into_iter()
            .filter_map(|(_, e)| match e {
                ChatEvent::ReceiveMessage(m) => Some(m.content),
                _ => None,
            })
            .collect();
        assert_eq!(committed, vec!["first", "second"]);
        assert_eq!(published, committed);
        assert_eq!(handler.ordering.len(), 0);
    }

    #[tokio::test]
    async fn sequential_sends_publish_in_commit_order() {
        let store = Arc::new(InMemoryChatStore::new());
        let bus = Arc::new(RecordingBus::default());
        let chat = chat_of("u1", &["u2"]);
        let chat_id = *chat.id();
        store.seed_chat(chat);
        let handler = handler(&store, &bus);

        for text in ["one", "two", "three"] {
            handler.handle(cmd("u1", chat_id, text)).await.unwrap();
        }

        let published: Vec<String> = bus
            .published()
            .into_iter()
            .filter_map(|(_, e)| match e {
                ChatEvent::ReceiveMessage(m) => Some(m.content),
                _ => None,
            })
            .collect();
        assert_eq!(published, vec!["one", "two", "three"]);
    }
}
