//! Local chat collection kept in sync with the server.
//!
//! Chats are ordered most recently active first. The store is plain data:
//! callers own synchronization.

use crate::domain::foundation::{ChatId, UserId};
use crate::ports::{ChatView, MessageView};

#[derive(Debug, Default, Clone)]
pub struct ChatStore {
    chats: Vec<ChatView>,
    active: Option<ChatId>,
    loading: bool,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chats(&self) -> &[ChatView] {
        &self.chats
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Replaces the whole collection with a fresh fetch.
    ///
    /// The active chat stays selected if it is still present.
    pub fn replace(&mut self, chats: Vec<ChatView>) {
        self.chats = chats;
        if let Some(active) = self.active {
            if self.position(&active).is_none() {
                self.active = None;
            }
        }
    }

    pub fn get_chat(&self, chat_id: &ChatId) -> Option<&ChatView> {
        self.chats.iter().find(|c| &c.id == chat_id)
    }

    pub fn active_chat(&self) -> Option<&ChatView> {
        self.active.as_ref().and_then(|id| self.get_chat(id))
    }

    /// Selects a chat, or clears the selection with `None`.
    ///
    /// Returns false if the chat is not in the store.
    pub fn set_active_chat(&mut self, chat_id: Option<ChatId>) -> bool {
        match chat_id {
            Some(id) if self.position(&id).is_none() => false,
            other => {
                self.active = other;
                true
            }
        }
    }

    /// Applies a relayed message.
    ///
    /// Returns true if the store changed. Unknown chats and already-seen
    /// message ids are ignored.
    pub fn receive_message(&mut self, message: MessageView) -> bool {
        let Some(index) = self.position(&message.chat_id) else {
            tracing::debug!(
                chat_id = %message.chat_id,
                message_id = %message.id,
                "Dropping message for unknown chat"
            );
            return false;
        };

        if self.chats[index].has_message(&message.id) {
            return false;
        }

        let mut chat = self.chats.remove(index);
        chat.last_message = Some(message.clone());
        chat.messages.push(message);
        self.chats.insert(0, chat);
        true
    }

    /// Adds a chat announced by the server unless it is already known.
    pub fn new_chat(&mut self, chat: ChatView) -> bool {
        if self.position(&chat.id).is_some() {
            return false;
        }
        self.chats.insert(0, chat);
        true
    }

    /// The non-group chat between exactly `me` and `other`, if any.
    pub fn find_existing_private_chat(&self, me: &UserId, other: &UserId) -> Option<&ChatView> {
        self.chats.iter().find(|chat| {
            !chat.is_group
                && chat.participants.len() == 2
                && chat.has_participant(me)
                && chat.has_participant(other)
        })
    }

    /// Forgets everything, e.g. on logout.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn position(&self, chat_id: &ChatId) -> Option<usize> {
        self.chats.iter().position(|c| &c.id == chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::MessageId;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn view(participants: &[&str], is_group: bool) -> ChatView {
        ChatView {
            id: ChatId::new(),
            name: String::new(),
            participants: participants.iter().map(|p| uid(p)).collect(),
            participants_info: vec![],
            messages: vec![],
            is_group,
            last_message: None,
        }
    }

    fn message(chat_id: ChatId, content: &str) -> MessageView {
        MessageView {
            id: MessageId::new(),
            chat_id,
            sender_id: uid("u1"),
            content: content.to_string(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn receive_message_moves_chat_to_front() {
        let mut store = ChatStore::new();
        let older = view(&["u1", "u2"], false);
        let newer = view(&["u1", "u3"], false);
        store.replace(vec![newer.clone(), older.clone()]);

        let msg = message(older.id, "hi");
        assert!(store.receive_message(msg.clone()));

        assert_eq!(store.chats()[0].id, older.id);
        assert_eq!(store.chats()[0].messages, vec![msg.clone()]);
        assert_eq!(store.chats()[0].last_message, Some(msg));
    }

    #[test]
    fn duplicate_message_id_is_ignored() {
        let mut store = ChatStore::new();
        let chat = view(&["u1", "u2"], false);
        store.replace(vec![chat.clone()]);
        let msg = message(chat.id, "once");

        assert!(store.receive_message(msg.clone()));
        assert!(!store.receive_message(msg));

        assert_eq!(store.chats()[0].messages.len(), 1);
    }

    #[test]
    fn message_for_unknown_chat_is_dropped() {
        let mut store = ChatStore::new();
        store.replace(vec![view(&["u1", "u2"], false)]);

        assert!(!store.receive_message(message(ChatId::new(), "lost")));
        assert!(store.chats()[0].messages.is_empty());
    }

    #[test]
    fn duplicate_new_chat_is_ignored() {
        let mut store = ChatStore::new();
        let chat = view(&["u1", "u2"], false);

        assert!(store.new_chat(chat.clone()));
        assert!(!store.new_chat(chat));
        assert_eq!(store.chats().len(), 1);
    }

    #[test]
    fn new_chat_is_prepended() {
        let mut store = ChatStore::new();
        let first = view(&["u1", "u2"], false);
        let second = view(&["u1", "u3"], false);
        store.new_chat(first);
        store.new_chat(second.clone());

        assert_eq!(store.chats()[0].id, second.id);
    }

    #[test]
    fn active_chat_reflects_new_messages() {
        let mut store = ChatStore::new();
        let chat = view(&["u1", "u2"], false);
        store.replace(vec![chat.clone()]);
        assert!(store.set_active_chat(Some(chat.id)));

        store.receive_message(message(chat.id, "hi"));

        assert_eq!(store.active_chat().map(|c| c.messages.len()), Some(1));
    }

    #[test]
    fn cannot_activate_unknown_chat() {
        let mut store = ChatStore::new();
        assert!(!store.set_active_chat(Some(ChatId::new())));
        assert!(store.active_chat().is_none());
    }

    #[test]
    fn finds_private_chat_but_not_groups() {
        let mut store = ChatStore::new();
        let group = view(&["u1", "u2"], true);
        let trio = view(&["u1", "u2", "u3"], false);
        let private = view(&["u2", "u1"], false);
        store.replace(vec![group, trio, private.clone()]);

        let found = store.find_existing_private_chat(&uid("u1"), &uid("u2"));

        assert_eq!(found.map(|c| c.id), Some(private.id));
        assert!(store
            .find_existing_private_chat(&uid("u1"), &uid("u3"))
            .is_none());
    }

    #[test]
    fn replace_drops_stale_selection() {
        let mut store = ChatStore::new();
        let chat = view(&["u1", "u2"], false);
        store.replace(vec![chat.clone()]);
        store.set_active_chat(Some(chat.id));

        store.replace(vec![view(&["u1", "u3"], false)]);

        assert!(store.active_chat().is_none());
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = ChatStore::new();
        let chat = view(&["u1", "u2"], false);
        store.replace(vec![chat.clone()]);
        store.set_active_chat(Some(chat.id));
        store.set_loading(true);

        store.clear();

        assert!(store.chats().is_empty());
        assert!(store.active_chat().is_none());
        assert!(!store.is_loading());
    }
}
