//! In-process broadcast bus.
//!
//! Publishes straight into the local [`RoomManager`]. Correct for a single
//! server process and for tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::websocket::RoomManager;
use crate::domain::chat::Room;
use crate::ports::{BroadcastBus, BusError, ChatEvent, ConnectionId};

/// Broadcast bus that delivers within this process only.
#[derive(Clone)]
pub struct LocalBroadcastBus {
    rooms: Arc<RoomManager>,
}

impl LocalBroadcastBus {
    pub fn new(rooms: Arc<RoomManager>) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl BroadcastBus for LocalBroadcastBus {
    async fn publish(&self, room: &Room, event: ChatEvent) -> Result<(), BusError> {
        let name = event.name();
        let delivered = self.rooms.deliver(room, event.into()).await;
        tracing::trace!(room = %room, event = name, delivered, "Published locally");
        Ok(())
    }

    async fn subscribe(&self, room: Room, connection: &ConnectionId) -> Result<(), BusError> {
        if self.rooms.join(connection, room).await {
            Ok(())
        } else {
            Err(BusError::UnknownConnection(*connection))
        }
    }

    async fn release(&self, connection: &ConnectionId) {
        self.rooms.unregister(connection).await;
    }
}
