//! Broadcast rooms.
//!
//! A room is an ephemeral broadcast group. Chat rooms carry messages for one
//! chat; user rooms carry personal notifications such as "new chat".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ChatId, UserId, ValidationError};

const CHAT_PREFIX: &str = "chat:";
const USER_PREFIX: &str = "user:";

/// Named broadcast group, rendered as `chat:<id>` or `user:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Room {
    Chat(ChatId),
    User(UserId),
}

impl Room {
    pub fn chat(id: ChatId) -> Self {
        Room::Chat(id)
    }

    pub fn user(id: &UserId) -> Self {
        Room::User(id.clone())
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Chat(id) => write!(f, "{}{}", CHAT_PREFIX, id),
            Room::User(id) => write!(f, "{}{}", USER_PREFIX, id),
        }
    }
}

impl FromStr for Room {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix(CHAT_PREFIX) {
            let id = id
                .parse::<ChatId>()
                .map_err(|e| ValidationError::invalid_format("room", e.to_string()))?;
            return Ok(Room::Chat(id));
        }
        if let Some(id) = s.strip_prefix(USER_PREFIX) {
            return Ok(Room::User(UserId::new(id)?));
        }
        Err(ValidationError::invalid_format(
            "room",
            format!("unknown room kind: {}", s),
        ))
    }
}

impl TryFrom<String> for Room {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Room> for String {
    fn from(room: Room) -> Self {
        room.to_string()
    }
}
