//! Chat client: local store, REST loading and realtime event handling.
//!
//! [`RealtimeConnection`] opens `/api/realtime` with the user's token, feeds
//! every frame it reads to [`ChatClient::handle_server_message`] and writes
//! the frames queued on the outbound queue it attaches with
//! [`ChatClient::attach_outbound`].
//!
//! Sends are fire-and-forget: the store only changes when the server relays
//! the committed message back.

mod api;
mod connection;
mod events;
mod store;

pub use api::{ApiError, ChatApi, HttpChatApi};
pub use connection::{realtime_url, ConnectionError, RealtimeConnection};
pub use events::{EventDispatcher, Subscription};
pub use store::ChatStore;

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::adapters::websocket::{
    ClientMessage, CreateChatPayload, SendMessagePayload, ServerMessage,
};
use crate::domain::chat::normalize_participants;
use crate::domain::foundation::{ChatId, UserId};
use crate::ports::ChatView;

/// Result of [`ChatClient::create_private_chat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateChatOutcome {
    /// A private chat already existed and is now active.
    Activated(ChatId),
    /// A `create_chat` request was queued.
    Requested,
    /// Nothing was done: self-chat or no outbound connection.
    Ignored,
}

/// Client-side chat state for one signed-in user.
pub struct ChatClient {
    user_id: UserId,
    api: Arc<dyn ChatApi>,
    store: RwLock<ChatStore>,
    dispatcher: EventDispatcher,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>,
}

impl ChatClient {
    pub fn new(user_id: UserId, api: Arc<dyn ChatApi>) -> Self {
        Self {
            user_id,
            api,
            store: RwLock::new(ChatStore::new()),
            dispatcher: EventDispatcher::new(),
            outbound: Mutex::new(None),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Attaches the queue of frames to write to the socket.
    pub fn attach_outbound(&self, sender: mpsc::UnboundedSender<ClientMessage>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    /// Detaches the outbound queue, e.g. when the socket closes.
    pub fn detach_outbound(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Detaches the outbound queue only if nothing reads it anymore, so a
    /// closed connection never detaches its replacement.
    pub(crate) fn detach_closed_outbound(&self) -> bool {
        let mut outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        if outbound.as_ref().is_some_and(|tx| tx.is_closed()) {
            outbound.take();
            return true;
        }
        false
    }

    pub fn is_connected(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Replaces the store with a fresh `GET /api/chats`.
    ///
    /// On failure the previous chats are kept and false is returned.
    pub async fn load_chats(&self) -> bool {
        self.write_store().set_loading(true);

        let result = self.api.list_chats().await;

        let mut store = self.write_store();
        store.set_loading(false);
        match result {
            Ok(chats) => {
                tracing::debug!(user_id = %self.user_id, count = chats.len(), "Chats loaded");
                store.replace(chats);
                true
            }
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "Failed to load chats");
                false
            }
        }
    }

    /// Applies a server frame to the store, then notifies listeners.
    pub fn handle_server_message(&self, message: ServerMessage) {
        match &message {
            ServerMessage::ReceiveMessage(view) => {
                self.write_store().receive_message(view.clone());
            }
            ServerMessage::NewChat(chat) => {
                self.write_store().new_chat(chat.clone());
            }
            ServerMessage::Error(err) => {
                tracing::warn!(user_id = %self.user_id, message = %err.message, "Server reported error");
            }
            ServerMessage::Connected(_) | ServerMessage::Pong(_) => {}
        }
        self.dispatcher.dispatch(&message);
    }

    /// Registers a listener for every server frame.
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(listener)
    }

    /// Queues a message for `chat_id`. Returns whether it was queued.
    pub fn send_message(&self, chat_id: &ChatId, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }
        self.send(ClientMessage::SendMessage(SendMessagePayload {
            chat_id: chat_id.to_string(),
            content: content.to_string(),
        }))
    }

    /// Requests a chat with `participants` plus the current user.
    ///
    /// It is a group when more than two people take part or a name is given.
    pub fn create_chat(&self, participants: Vec<UserId>, name: &str) -> bool {
        let participants = normalize_participants(&self.user_id, participants);
        let is_group = participants.len() > 2 || !name.is_empty();

        self.send(ClientMessage::CreateChat(CreateChatPayload {
            participants: participants.iter().map(ToString::to_string).collect(),
            name: (!name.is_empty()).then(|| name.to_string()),
            is_group,
        }))
    }

    /// Opens the private chat with `other`, creating it only if none exists.
    pub fn create_private_chat(&self, other: &UserId) -> PrivateChatOutcome {
        if other == &self.user_id {
            return PrivateChatOutcome::Ignored;
        }

        let existing = self
            .read_store()
            .find_existing_private_chat(&self.user_id, other)
            .map(|chat| chat.id);
        if let Some(chat_id) = existing {
            self.write_store().set_active_chat(Some(chat_id));
            return PrivateChatOutcome::Activated(chat_id);
        }

        if self.create_chat(vec![other.clone()], "") {
            PrivateChatOutcome::Requested
        } else {
            PrivateChatOutcome::Ignored
        }
    }

    /// Queues a heartbeat.
    pub fn ping(&self) -> bool {
        self.send(ClientMessage::Ping)
    }

    pub fn chats(&self) -> Vec<ChatView> {
        self.read_store().chats().to_vec()
    }

    pub fn get_chat(&self, chat_id: &ChatId) -> Option<ChatView> {
        self.read_store().get_chat(chat_id).cloned()
    }

    pub fn active_chat(&self) -> Option<ChatView> {
        self.read_store().active_chat().cloned()
    }

    pub fn set_active_chat(&self, chat_id: Option<ChatId>) -> bool {
        self.write_store().set_active_chat(chat_id)
    }

    pub fn is_loading(&self) -> bool {
        self.read_store().is_loading()
    }

    /// Drops all local state and the outbound queue.
    pub fn logout(&self) {
        self.detach_outbound();
        self.write_store().clear();
    }

    fn send(&self, message: ClientMessage) -> bool {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound.as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => {
                tracing::debug!(user_id = %self.user_id, "Not connected, dropping outbound frame");
                false
            }
        }
    }

    fn read_store(&self) -> std::sync::RwLockReadGuard<'_, ChatStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> std::sync::RwLockWriteGuard<'_, ChatStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}
