//! CreateChatHandler - creates a chat and notifies its participants.

use std::sync::Arc;

use crate::domain::chat::{Chat, ChatError, Room};
use crate::domain::foundation::UserId;
use crate::ports::{BroadcastBus, ChatEvent, ChatRepository, ChatView, ConnectionId, ParticipantInfo};

/// Command to create a chat.
#[derive(Debug, Clone)]
pub struct CreateChatCommand {
    /// Connection that issued the request; it joins the new chat room.
    pub connection_id: ConnectionId,
    pub creator_id: UserId,
    /// Raw participant ids as received from the client.
    pub participants: Vec<String>,
    pub name: Option<String>,
    pub is_group: bool,
}

/// Result of successful chat creation.
#[derive(Debug, Clone)]
pub struct CreateChatResult {
    pub chat: Chat,
    pub view: ChatView,
}

/// Handler for creating chats.
pub struct CreateChatHandler {
    repository: Arc<dyn ChatRepository>,
    bus: Arc<dyn BroadcastBus>,
}

impl CreateChatHandler {
    pub fn new(repository: Arc<dyn ChatRepository>, bus: Arc<dyn BroadcastBus>) -> Self {
        Self { repository, bus }
    }

    pub async fn handle(&self, cmd: CreateChatCommand) -> Result<CreateChatResult, ChatError> {
        // 1. Parse and normalize participants
        let requested = cmd
            .participants
            .into_iter()
            .map(UserId::new)
            .collect::<Result<Vec<_>, _>>()?;

        let name = cmd.name.filter(|n| !n.trim().is_empty());
        let chat = Chat::create(&cmd.creator_id, requested, name, cmd.is_group)?;

        // 2. Persist
        self.repository.insert_chat(&chat).await.map_err(|e| {
            tracing::error!(
                user_id = %cmd.creator_id,
                chat_id = %chat.id(),
                error = %e,
                "Failed to create chat"
            );
            ChatError::ChatCreationFailed(e.to_string())
        })?;

        // 3. Participant info, falling back to ids
        let info = match self.repository.find_users_by_ids(chat.participants()).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    chat_id = %chat.id(),
                    error = %e,
                    "Failed to load participant info; sending ids only"
                );
                chat.participants()
                    .iter()
                    .cloned()
                    .map(ParticipantInfo::id_only)
                    .collect()
            }
        };
        let view = ChatView::from_chat(&chat, info, Vec::new());

        // 4. Notify every participant's personal room
        for participant in chat.participants() {
            let room = Room::user(participant);
            if let Err(e) = self.bus.publish(&room, ChatEvent::NewChat(view.clone())).await {
                tracing::error!(
                    chat_id = %chat.id(),
                    room = %room,
                    error = %e,
                    "Failed to notify participant of new chat"
                );
            }
        }

        // 5. The creating connection joins right away
        let room = Room::chat(*chat.id());
        if let Err(e) = self.bus.subscribe(room.clone(), &cmd.connection_id).await {
            tracing::warn!(
                connection_id = %cmd.connection_id,
                room = %room,
                error = %e,
                "Creator connection could not join new chat room"
            );
        }

        tracing::info!(
            user_id = %cmd.creator_id,
            chat_id = %chat.id(),
            participants = chat.participants().len(),
            is_group = chat.is_group(),
            "Chat created"
        );

        Ok(CreateChatResult { chat, view })
    }
}
