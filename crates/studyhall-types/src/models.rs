use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum chat message body length, in characters.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Senders may edit their own messages for this long after posting.
pub const EDIT_WINDOW_MINUTES: i64 = 15;

/// Body stored in place of a soft-deleted message.
pub const DELETED_MESSAGE_BODY: &str = "This message was deleted";

// -- Semesters & rooms --

/// A semester in the fixed range 1..=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Semester(u8);

impl Semester {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 8;

    pub fn new(n: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(Self(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Semester {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Semester::new(n).ok_or_else(|| format!("semester must be between {} and {}", Self::MIN, Self::MAX))
    }
}

impl From<Semester> for u8 {
    fn from(s: Semester) -> u8 {
        s.0
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pub/sub room. Rooms are derived from user profiles and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    General,
    Semester(Semester),
    /// Private room of a single user, used only for notification delivery.
    User(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::General => f.write_str("general"),
            Room::Semester(s) => write!(f, "semester-{}", s),
            Room::User(id) => write!(f, "user-{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRoom(pub String);

impl fmt::Display for UnknownRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown room '{}'", self.0)
    }
}

impl std::error::Error for UnknownRoom {}

/// Accepts `general`, `semester-<n>`, a bare semester number `<n>`, and `user-<uuid>`.
impl FromStr for Room {
    type Err = UnknownRoom;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("general") {
            return Ok(Room::General);
        }
        if let Some(id) = s.strip_prefix("user-") {
            return id
                .parse::<Uuid>()
                .map(Room::User)
                .map_err(|_| UnknownRoom(s.to_string()));
        }
        let n = s.strip_prefix("semester-").unwrap_or(s);
        n.parse::<u8>()
            .ok()
            .and_then(Semester::new)
            .map(Room::Semester)
            .ok_or_else(|| UnknownRoom(s.to_string()))
    }
}

impl Serialize for Room {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Room {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// -- Users --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Public display fields of a user, attached to messages and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub profile_picture: Option<String>,
}

// -- Chat --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::File => "file",
            MessageKind::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageKind::Text),
            "file" => Some(MessageKind::File),
            "image" => Some(MessageKind::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Preview of the message being replied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreview {
    pub id: Uuid,
    pub message: String,
    pub sender: UserProfile,
}

/// A chat message with sender and reply fields resolved, as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub room: Room,
    pub sender: UserProfile,
    pub message: String,
    pub message_type: MessageKind,
    pub reply_to: Option<ReplyPreview>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub reactions: Vec<Reaction>,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    NewNote,
    NoteLiked,
    PostReply,
    PostUpvote,
    NoteDownloaded,
    AdminMessage,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::NewNote => "new-note",
            NotificationType::NoteLiked => "note-liked",
            NotificationType::PostReply => "post-reply",
            NotificationType::PostUpvote => "post-upvote",
            NotificationType::NoteDownloaded => "note-downloaded",
            NotificationType::AdminMessage => "admin-message",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new-note" => Some(NotificationType::NewNote),
            "note-liked" => Some(NotificationType::NoteLiked),
            "post-reply" => Some(NotificationType::PostReply),
            "post-upvote" => Some(NotificationType::PostUpvote),
            "note-downloaded" => Some(NotificationType::NoteDownloaded),
            "admin-message" => Some(NotificationType::AdminMessage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Note,
    Post,
    Chat,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Note => "note",
            PayloadKind::Post => "post",
            PayloadKind::Chat => "chat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "note" => Some(PayloadKind::Note),
            "post" => Some(PayloadKind::Post),
            "chat" => Some(PayloadKind::Chat),
            _ => None,
        }
    }
}

/// Typed reference to the entity a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRef {
    pub kind: PayloadKind,
    pub id: Uuid,
}

/// Display fields resolved from a payload reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadDetails {
    pub kind: PayloadKind,
    pub id: Uuid,
    /// Set for chat payloads whose message still exists.
    pub room: Option<Room>,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender: Option<UserProfile>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub payload: Option<PayloadDetails>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
