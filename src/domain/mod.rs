//! Domain layer - chat vocabulary and invariants.
//!
//! Pure types with no I/O. Ports and adapters build on these.

pub mod chat;
pub mod foundation;
