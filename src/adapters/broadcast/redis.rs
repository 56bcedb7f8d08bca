//! Redis pub/sub broadcast bus for multi-process deployments.
//!
//! Every process publishes `{room, event}` envelopes on one shared channel
//! and runs a relay task that subscribes to that channel and delivers each
//! envelope to its own [`RoomManager`]. Publishing never delivers locally;
//! the local copy arrives through the relay like everyone else's, so the
//! relay resubscribes with backoff whenever its subscription drops.
//!
//! ```text
//! Server A publish ──▶ Redis channel ──▶ relay (A) ──▶ RoomManager (A)
//!                                    └─▶ relay (B) ──▶ RoomManager (B)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::adapters::websocket::RoomManager;
use crate::domain::chat::Room;
use crate::ports::{BroadcastBus, BusError, ChatEvent, ConnectionId};

/// Wire envelope carried on the shared channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub room: Room,
    #[serde(flatten)]
    pub event: ChatEvent,
}

impl BusEnvelope {
    pub fn encode(&self) -> Result<String, BusError> {
        serde_json::to_string(self).map_err(|e| BusError::Serialization(e.to_string()))
    }

    pub fn decode(payload: &str) -> Result<Self, BusError> {
        serde_json::from_str(payload).map_err(|e| BusError::Serialization(e.to_string()))
    }
}

/// Broadcast bus backed by a Redis pub/sub channel.
#[derive(Clone)]
pub struct RedisBroadcastBus {
    conn: MultiplexedConnection,
    channel: String,
    rooms: Arc<RoomManager>,
}

impl RedisBroadcastBus {
    /// Opens the publishing connection.
    pub async fn connect(
        client: &redis::Client,
        channel: impl Into<String>,
        rooms: Arc<RoomManager>,
        timeout: Duration,
    ) -> Result<Self, BusError> {
        let conn = tokio::time::timeout(timeout, client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| BusError::Redis("timed out connecting to Redis".to_string()))?
            .map_err(|e| BusError::Redis(e.to_string()))?;

        Ok(Self {
            conn,
            channel: channel.into(),
            rooms,
        })
    }
}

#[async_trait]
impl BroadcastBus for RedisBroadcastBus {
    async fn publish(&self, room: &Room, event: ChatEvent) -> Result<(), BusError> {
        let payload = BusEnvelope {
            room: room.clone(),
            event,
        }
        .encode()?;

        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .await
            .map_err(|e: redis::RedisError| BusError::Redis(e.to_string()))?;

        tracing::trace!(room = %room, receivers, "Published to Redis");
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

/// Delivers one raw channel payload to the local rooms.
///
/// Returns how many local connections received it.
pub async fn relay_payload(rooms: &RoomManager, payload: &str) -> Result<usize, BusError> {
    let envelope = BusEnvelope::decode(payload)?;
    Ok(rooms.deliver(&envelope.room, envelope.event.into()).await)
}

/// Payloads of one live channel subscription.
pub type RelayStream = BoxStream<'static, String>;

/// Opens a dedicated pub/sub connection and subscribes it to `channel`.
pub async fn subscribe_channel(
    client: &redis::Client,
    channel: &str,
    timeout: Duration,
) -> Result<RelayStream, BusError> {
    let conn = tokio::time::timeout(timeout, client.get_async_connection())
        .await
        .map_err(|_| BusError::Redis("timed out connecting to Redis".to_string()))?
        .map_err(|e| BusError::Redis(e.to_string()))?;

    let mut pubsub = conn.into_pubsub();
    pubsub
        .subscribe(channel)
        .await
        .map_err(|e| BusError::Redis(e.to_string()))?;

    let payloads = pubsub.into_on_message().filter_map(|msg| async move {
        match msg.get_payload::<String>() {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable relay payload");
                None
            }
        }
    });
    Ok(payloads.boxed())
}

/// Exponential delay between relay resubscription attempts.
#[derive(Debug, Clone)]
pub struct RelayBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl RelayBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Returns the delay to wait now and doubles the next one, up to `max`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Relays every envelope from `initial` to `rooms`, resubscribing whenever
/// the subscription is lost.
///
/// Never returns. The caller subscribes `initial` before serving so that no
/// publish is missed at startup; `resubscribe` opens each replacement.
pub async fn run_relay<F, Fut>(
    rooms: Arc<RoomManager>,
    initial: RelayStream,
    mut resubscribe: F,
    mut backoff: RelayBackoff,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RelayStream, BusError>>,
{
    let mut stream = initial;
    loop {
        let relayed = pump(&rooms, &mut stream).await;
        tracing::error!(relayed, "Broadcast relay subscription lost, resubscribing");

        stream = loop {
            let delay = backoff.next_delay();
            tokio::time::sleep(delay).await;
            match resubscribe().await {
                Ok(stream) => {
                    tracing::info!(after_ms = delay.as_millis() as u64, "Broadcast relay resubscribed");
                    backoff.reset();
                    break stream;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        waited_ms = delay.as_millis() as u64,
                        "Broadcast relay resubscribe failed"
                    );
                }
            }
        };
    }
}

/// Drains one subscription. Returns how many envelopes were relayed.
async fn pump(rooms: &RoomManager, stream: &mut RelayStream) -> u64 {
    let mut relayed = 0;
    while let Some(payload) = stream.next().await {
        match relay_payload(rooms, &payload).await {
            Ok(_) => relayed += 1,
            Err(e) => tracing::warn!(error = %e, "Dropped malformed relay envelope"),
        }
    }
    relayed
}
