use serde::{Deserialize, Serialize};

use crate::db::Message;

/// Frames a client may send over the channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientIntent {
    JoinRoom { room_id: i64 },
    SendMessage { room_id: i64, content: String },
    LeaveRoom { room_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKind {
    Joined,
    Left,
    Disconnected,
}

impl PresenceKind {
    pub fn describe(self, username: &str) -> String {
        match self {
            Self::Joined => format!("{username} joined the room."),
            Self::Left => format!("{username} left the room."),
            Self::Disconnected => format!("{username} disconnected."),
        }
    }
}

/// Frames the server delivers. `Joined`, `History` and `ErrorMessage` are
/// unicast to the requester; `NewMessage` and `Presence` are room
/// broadcasts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Joined {
        room_id: i64,
        room_name: String,
    },
    History {
        messages: Vec<Message>,
    },
    NewMessage {
        message: Message,
    },
    Presence {
        room_id: i64,
        kind: PresenceKind,
        username: String,
        message: String,
    },
    ErrorMessage {
        message: String,
    },
}
