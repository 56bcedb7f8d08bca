//! Shared fakes for chat handler tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::chat::{Chat, Room};
use crate::domain::foundation::UserId;
use crate::ports::{BroadcastBus, BusError, ChatEvent, ConnectionId};

/// Bus that records every call instead of delivering.
#[derive(Default)]
pub struct RecordingBus {
    pub published: Mutex<Vec<(Room, ChatEvent)>>,
    pub subscriptions: Mutex<Vec<(Room, ConnectionId)>>,
    pub released: Mutex<Vec<ConnectionId>>,
    pub fail_publish: AtomicBool,
}

impl RecordingBus {
    pub fn failing() -> Self {
        let bus = Self::default();
        bus.fail_publish.store(true, Ordering::SeqCst);
        bus
    }

    pub fn published(&self) -> Vec<(Room, ChatEvent)> {
        self.published.lock().unwrap().clone()
    }

    pub fn rooms_of(&self, connection: &ConnectionId) -> Vec<Room> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == connection)
            .map(|(r, _)| r.clone())
            .collect()
    }
}

#[async_trait]
impl BroadcastBus for RecordingBus {
    async fn publish(&self, room: &Room, event: ChatEvent) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Redis("simulated outage".into()));
        }
        self.published.lock().unwrap().push((room.clone(), event));
        Ok(())
    }

    async fn subscribe(&self, room: Room, connection: &ConnectionId) -> Result<(), BusError> {
        self.subscriptions.lock().unwrap().push((room, *connection));
        Ok(())
    }

    async fn release(&self, connection: &ConnectionId) {
        self.released.lock().unwrap().push(*connection);
    }
}

pub fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

pub fn chat_of(creator: &str, others: &[&str]) -> Chat {
    Chat::create(&uid(creator), others.iter().map(|s| uid(s)).collect(), None, false).unwrap()
}
