use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, MessageKind, Notification, NotificationType, Reaction, Room, Semester};

/// Events sent FROM server TO client over the WebSocket gateway.
///
/// Wire form: `{"type": "<kebab-name>", "data": {...camelCase fields}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent once to a connection after authentication succeeds
    Ready {
        user_id: Uuid,
        user_name: String,
        semester: Semester,
        rooms: Vec<Room>,
    },

    NewMessage(ChatMessage),

    MessageEdited(ChatMessage),

    MessageDeleted { message_id: Uuid, room: Room },

    /// Full reaction list of a message after a toggle, in insertion order
    ReactionUpdated {
        message_id: Uuid,
        reactions: Vec<Reaction>,
    },

    MessageRead {
        message_id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    },

    UserTyping {
        user_id: Uuid,
        user_name: String,
        is_typing: bool,
    },

    UserConnected { user_id: Uuid, user_name: String },

    UserDisconnected { user_id: Uuid, user_name: String },

    /// Pushed to a single recipient's private room
    Notification {
        #[serde(rename = "type")]
        kind: NotificationType,
        data: Notification,
    },

    /// Scoped to the connection that caused it, never broadcast
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Ready { .. } => "ready",
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::MessageEdited(_) => "message-edited",
            ServerEvent::MessageDeleted { .. } => "message-deleted",
            ServerEvent::ReactionUpdated { .. } => "reaction-updated",
            ServerEvent::MessageRead { .. } => "message-read",
            ServerEvent::UserTyping { .. } => "user-typing",
            ServerEvent::UserConnected { .. } => "user-connected",
            ServerEvent::UserDisconnected { .. } => "user-disconnected",
            ServerEvent::Notification { .. } => "notification",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
///
/// Room names are kept as raw strings; the broker resolves and authorizes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinRoom(String),

    LeaveRoom(String),

    SendMessage {
        room: String,
        message: String,
        #[serde(default)]
        message_type: MessageKind,
        #[serde(default)]
        reply_to: Option<Uuid>,
    },

    EditMessage { message_id: Uuid, new_message: String },

    DeleteMessage { message_id: Uuid },

    AddReaction { message_id: Uuid, emoji: String },

    TypingStart { room: String },

    TypingStop { room: String },

    MarkRead { message_id: Uuid },
}
