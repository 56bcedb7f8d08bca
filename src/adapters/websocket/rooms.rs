//! Connection registry and room membership.
//!
//! Each live connection owns a bounded outbound queue. Rooms map to the
//! set of connections subscribed to them, and each connection remembers its
//! rooms for O(rooms) cleanup on disconnect.
//!
//! ```text
//! Room: chat:42          Room: user:u1
//! ├── conn-a (u1)        └── conn-a (u1)
//! └── conn-b (u2)
//! ```
//!
//! Delivery to a room clones the message into every member's queue while
//! holding the read lock, so messages published to one room in sequence
//! are queued to every member in that same sequence.
//!
//! A connection whose queue is full is evicted. Its socket closes once the
//! frames already queued have been written.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;

use crate::domain::chat::Room;
use crate::domain::foundation::UserId;
use crate::ports::ConnectionId;

use super::messages::ServerMessage;

struct ConnectionEntry {
    user_id: UserId,
    sender: mpsc::Sender<ServerMessage>,
    rooms: HashSet<Room>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<Room, HashSet<ConnectionId>>,
}

/// Outbound frames buffered per connection when no capacity is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Outcome of queueing one frame for one connection.
enum Enqueue {
    Queued,
    Closed,
    Full,
}

fn enqueue(sender: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> Enqueue {
    match sender.try_send(message) {
        Ok(()) => Enqueue::Queued,
        Err(TrySendError::Closed(_)) => Enqueue::Closed,
        Err(TrySendError::Full(_)) => Enqueue::Full,
    }
}

/// Registry of live connections on this process.
pub struct RoomManager {
    registry: RwLock<Registry>,
    queue_capacity: usize,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose connections buffer at most `queue_capacity`
    /// outbound frames. A capacity of zero is raised to one.
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Registers a connection and returns the receiving end of its queue.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let mut registry = self.registry.write().await;
        registry.connections.insert(
            connection_id,
            ConnectionEntry {
                user_id,
                sender: tx,
                rooms: HashSet::new(),
            },
        );
        rx
    }

    /// Subscribes a registered connection to `room`.
    ///
    /// Returns false if the connection is unknown. Joining twice is a no-op.
    pub async fn join(&self, connection_id: &ConnectionId, room: Room) -> bool {
        let mut registry = self.registry.write().await;
        let Some(entry) = registry.connections.get_mut(connection_id) else {
            return false;
        };
        entry.rooms.insert(room.clone());
        registry
            .rooms
            .entry(room)
            .or_default()
            .insert(*connection_id);
        true
    }

    /// Rooms a connection is subscribed to.
    pub async fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<Room> {
        self.registry
            .read()
            .await
            .connections
            .get(connection_id)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Queues `message` for every connection in `room`.
    ///
    /// Returns how many connections it was queued for. Members whose queue
    /// is full are evicted.
    pub async fn deliver(&self, room: &Room, message: ServerMessage) -> usize {
        let mut delivered = 0;
        let mut overflowed = Vec::new();
        {
            let registry = self.registry.read().await;
            let Some(members) = registry.rooms.get(room) else {
                return 0;
            };

            for connection_id in members {
                let Some(entry) = registry.connections.get(connection_id) else {
                    continue;
                };
                match enqueue(&entry.sender, message.clone()) {
                    Enqueue::Queued => delivered += 1,
                    Enqueue::Closed => {}
                    Enqueue::Full => overflowed.push(*connection_id),
                }
            }
        }

        for connection_id in &overflowed {
            self.evict(connection_id).await;
        }
        delivered
    }

    /// Queues `message` for one connection, evicting it if its queue is full.
    pub async fn send_to(&self, connection_id: &ConnectionId, message: ServerMessage) -> bool {
        let outcome = {
            let registry = self.registry.read().await;
            match registry.connections.get(connection_id) {
                Some(entry) => enqueue(&entry.sender, message),
                None => return false,
            }
        };

        match outcome {
            Enqueue::Queued => true,
            Enqueue::Closed => false,
            Enqueue::Full => {
                self.evict(connection_id).await;
                false
            }
        }
    }

    async fn evict(&self, connection_id: &ConnectionId) {
        if let Some(user_id) = self.unregister(connection_id).await {
            tracing::warn!(
                user_id = %user_id,
                connection_id = %connection_id,
                capacity = self.queue_capacity,
                "Outbound queue full, disconnecting slow client"
            );
        }
    }

    /// Removes a connection and all of its subscriptions.
    ///
    /// Dropping the queue's sender ends the connection's writer once it has
    /// drained what was already queued. Returns the user the connection
    /// belonged to, if it was registered.
    pub async fn unregister(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let mut registry = self.registry.write().await;
        let entry = registry.connections.remove(connection_id)?;

        for room in &entry.rooms {
            let now_empty = match registry.rooms.get_mut(room) {
                Some(members) => {
                    members.remove(connection_id);
                    members.is_empty()
                }
                None => false,
            };
            if now_empty {
                registry.rooms.remove(room);
            }
        }

        Some(entry.user_id)
    }

    /// Number of connections subscribed to `room`.
    pub async fn client_count(&self, room: &Room) -> usize {
        self.registry
            .read()
            .await
            .rooms
            .get(room)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Rooms with at least one subscriber.
    pub async fn active_rooms(&self) -> Vec<Room> {
        self.registry.read().await.rooms.keys().cloned().collect()
    }

    /// Total number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }
}
