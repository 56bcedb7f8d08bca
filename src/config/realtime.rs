//! Realtime (WebSocket fan-out) configuration

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;

/// Which broadcast bus delivers room events.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// In-process only; fine for a single server.
    #[default]
    Memory,
    /// Redis pub/sub; required when running more than one server.
    Redis,
}

/// Realtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default)]
    pub bus: BusKind,

    /// Redis channel carrying room envelopes
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Outbound frames buffered per connection before the connection is dropped
    #[serde(default = "default_queue_capacity")]
    pub connection_queue_capacity: usize,

    /// First delay before resubscribing a lost relay, in milliseconds
    #[serde(default = "default_relay_backoff_min_ms")]
    pub relay_backoff_min_ms: u64,

    /// Upper bound for the relay resubscribe delay, in milliseconds
    #[serde(default = "default_relay_backoff_max_ms")]
    pub relay_backoff_max_ms: u64,
}

impl RealtimeConfig {
    pub fn uses_redis(&self) -> bool {
        self.bus == BusKind::Redis
    }

    pub fn relay_backoff_min(&self) -> Duration {
        Duration::from_millis(self.relay_backoff_min_ms)
    }

    pub fn relay_backoff_max(&self) -> Duration {
        Duration::from_millis(self.relay_backoff_max_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uses_redis() && self.channel.trim().is_empty() {
            return Err(ValidationError::EmptyChannel);
        }
        if self.connection_queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        if self.relay_backoff_min_ms > self.relay_backoff_max_ms {
            return Err(ValidationError::InvalidRelayBackoff);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            bus: BusKind::default(),
            channel: default_channel(),
            connection_queue_capacity: default_queue_capacity(),
            relay_backoff_min_ms: default_relay_backoff_min_ms(),
            relay_backoff_max_ms: default_relay_backoff_max_ms(),
        }
    }
}

fn default_channel() -> String {
    "freelance-chat:rooms".to_string()
}

fn default_queue_capacity() -> usize {
    128
}

fn default_relay_backoff_min_ms() -> u64 {
    250
}

fn default_relay_backoff_max_ms() -> u64 {
    30_000
}
