//! Chat aggregate.

use crate::domain::foundation::{ChatId, MessageId, Timestamp, UserId};

use super::ChatError;

/// Minimum number of distinct participants in any chat.
pub const MIN_PARTICIPANTS: usize = 2;

/// A private or group conversation.
///
/// Invariants:
/// - at least [`MIN_PARTICIPANTS`] participants
/// - no user id appears twice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    id: ChatId,
    name: String,
    participants: Vec<UserId>,
    is_group: bool,
    last_message_id: Option<MessageId>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Chat {
    /// Creates a new chat on behalf of `creator`.
    ///
    /// The creator is appended to `requested` if absent and duplicates are
    /// dropped. The chat is a group when `is_group_hint` is set or when more
    /// than two participants remain.
    pub fn create(
        creator: &UserId,
        requested: Vec<UserId>,
        name: Option<String>,
        is_group_hint: bool,
    ) -> Result<Self, ChatError> {
        let participants = normalize_participants(creator, requested);
        if participants.len() < MIN_PARTICIPANTS {
            return Err(ChatError::validation(
                "participants",
                "a chat needs at least two distinct participants",
            ));
        }

        let is_group = is_group_hint || participants.len() > MIN_PARTICIPANTS;
        let now = Timestamp::now();

        Ok(Self {
            id: ChatId::new(),
            name: name.unwrap_or_default(),
            participants,
            is_group,
            last_message_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a chat from storage without re-running creation rules.
    pub fn reconstitute(
        id: ChatId,
        name: String,
        participants: Vec<UserId>,
        is_group: bool,
        last_message_id: Option<MessageId>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            participants,
            is_group,
            last_message_id,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &ChatId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn last_message_id(&self) -> Option<&MessageId> {
        self.last_message_id.as_ref()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// Points the chat at its newest message.
    pub fn record_message(&mut self, message_id: MessageId, at: Timestamp) {
        self.last_message_id = Some(message_id);
        self.updated_at = at;
    }
}

/// Deduplicates `requested` (first occurrence wins) and appends `creator`
/// when it is not already present.
pub fn normalize_participants(creator: &UserId, requested: Vec<UserId>) -> Vec<UserId> {
    let mut participants: Vec<UserId> = Vec::with_capacity(requested.len() + 1);
    for id in requested {
        if !participants.contains(&id) {
            participants.push(id);
        }
    }
    if !participants.contains(creator) {
        participants.push(creator.clone());
    }
    participants
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn private_chat_appends_creator() {
        let chat = Chat::create(&uid("u1"), vec![uid("u2")], None, false).unwrap();
        assert_eq!(chat.participants(), &[uid("u2"), uid("u1")]);
        assert!(!chat.is_group());
        assert_eq!(chat.name(), "");
        assert!(chat.last_message_id().is_none());
    }

    #[test]
    fn creator_already_listed_is_not_duplicated() {
        let chat = Chat::create(&uid("u1"), vec![uid("u1"), uid("u2")], None, false).unwrap();
        assert_eq!(chat.participants(), &[uid("u1"), uid("u2")]);
    }

    #[test]
    fn three_participants_make_a_group() {
        let chat = Chat::create(&uid("u1"), vec![uid("u2"), uid("u3")], None, false).unwrap();
        assert!(chat.is_group());
    }

    #[test]
    fn hint_forces_group_for_two_people() {
        let chat = Chat::create(&uid("u1"), vec![uid("u2")], Some("Design".into()), true).unwrap();
        assert!(chat.is_group());
        assert_eq!(chat.name(), "Design");
    }

    #[test]
    fn chat_with_only_creator_is_rejected() {
        let result = Chat::create(&uid("u1"), vec![uid("u1")], None, false);
        assert!(matches!(result, Err(ChatError::ValidationFailed { .. })));

        let result = Chat::create(&uid("u1"), vec![], None, false);
        assert!(result.is_err());
    }

    #[test]
    fn record_message_moves_pointer_and_timestamp() {
        let mut chat = Chat::create(&uid("u1"), vec![uid("u2")], None, false).unwrap();
        let message_id = MessageId::new();
        let at = Timestamp::from_unix_millis(chat.updated_at().as_unix_millis() + 1_000);
        chat.record_message(message_id, at);
        assert_eq!(chat.last_message_id(), Some(&message_id));
        assert_eq!(chat.updated_at(), &at);
    }

    proptest! {
        #[test]
        fn creator_appears_exactly_once(
            ids in proptest::collection::vec("[a-c]{1,2}", 0..8),
            creator in "[a-c]{1,2}",
        ) {
            let creator = uid(&creator);
            let requested: Vec<UserId> = ids.iter().map(|s| uid(s)).collect();
            let participants = normalize_participants(&creator, requested);

            prop_assert_eq!(participants.iter().filter(|p| **p == creator).count(), 1);
        }

        #[test]
        fn participants_are_unique(ids in proptest::collection::vec("[a-d]", 0..10)) {
            let creator = uid("z");
            let requested: Vec<UserId> = ids.iter().map(|s| uid(s)).collect();
            let participants = normalize_participants(&creator, requested);

            let mut sorted = participants.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), participants.len());
        }
    }
}
