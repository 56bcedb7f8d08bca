//! JoinRoomsHandler - subscribes a fresh connection to its rooms.
//!
//! Every authenticated connection joins its personal `user:<id>` room and
//! one `chat:<id>` room per chat the user participates in.

use std::sync::Arc;

use crate::domain::chat::{ChatError, Room};
use crate::domain::foundation::UserId;
use crate::ports::{BroadcastBus, ChatRepository, ConnectionId};

/// Command to join the rooms of a newly authenticated connection.
#[derive(Debug, Clone)]
pub struct JoinRoomsCommand {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

/// Rooms the connection ended up subscribed to.
#[derive(Debug, Clone)]
pub struct JoinRoomsResult {
    pub rooms: Vec<Room>,
}

/// Handler for room membership on connect.
pub struct JoinRoomsHandler {
    repository: Arc<dyn ChatRepository>,
    bus: Arc<dyn BroadcastBus>,
}

impl JoinRoomsHandler {
    pub fn new(repository: Arc<dyn ChatRepository>, bus: Arc<dyn BroadcastBus>) -> Self {
        Self { repository, bus }
    }

    /// Fails only if the personal room cannot be joined. A failed chat
    /// lookup leaves the connection in its personal room alone.
    pub async fn handle(&self, cmd: JoinRoomsCommand) -> Result<JoinRoomsResult, ChatError> {
        let personal = Room::user(&cmd.user_id);
        self.bus
            .subscribe(personal.clone(), &cmd.connection_id)
            .await
            .map_err(|e| ChatError::persistence(e.to_string()))?;

        let mut rooms = vec![personal];

        let chat_ids = match self
            .repository
            .find_chat_ids_by_participant(&cmd.user_id)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(
                    user_id = %cmd.user_id,
                    connection_id = %cmd.connection_id,
                    error = %e,
                    "Failed to load chat memberships; connection keeps personal room only"
                );
                return Ok(JoinRoomsResult { rooms });
            }
        };

        for chat_id in chat_ids {
            let room = Room::chat(chat_id);
            if rooms.contains(&room) {
                continue;
            }
            if let Err(e) = self.bus.subscribe(room.clone(), &cmd.connection_id).await {
                tracing::warn!(
                    connection_id = %cmd.connection_id,
                    room = %room,
                    error = %e,
                    "Failed to join chat room"
                );
                continue;
            }
            rooms.push(room);
        }

        tracing::debug!(
            user_id = %cmd.user_id,
            connection_id = %cmd.connection_id,
            rooms = rooms.len(),
            "Connection joined rooms"
        );

        Ok(JoinRoomsResult { rooms })
    }
}
