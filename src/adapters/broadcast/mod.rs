//! Broadcast bus adapters.
//!
//! - `LocalBroadcastBus` - single process, delivers in memory
//! - `RedisBroadcastBus` - multi-process, relays through one Redis channel

mod local;
mod redis;

pub use self::redis::{
    relay_payload, run_relay, subscribe_channel, BusEnvelope, RedisBroadcastBus, RelayBackoff,
    RelayStream,
};
pub use local::LocalBroadcastBus;
