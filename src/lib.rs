//! Freelance Chat - real-time chat for the freelance marketplace
//!
//! Authenticated users exchange messages in private and group chats over a
//! WebSocket connection, backed by PostgreSQL and fanned out through
//! per-user and per-chat rooms.

pub mod adapters;
pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod ports;
