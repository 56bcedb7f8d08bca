//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the chat core to external systems:
//! - `auth` - JWT session validation (and a mock for tests)
//! - `broadcast` - Room fan-out, in-process or over Redis pub/sub
//! - `http` - REST endpoints, middleware and the app router
//! - `memory` - In-memory store for tests and local runs
//! - `postgres` - PostgreSQL persistence
//! - `websocket` - Realtime connection handling

pub mod auth;
pub mod broadcast;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod websocket;
