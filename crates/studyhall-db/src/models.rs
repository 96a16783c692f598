/// Database row types, mapped directly from SQLite rows.
/// Distinct from studyhall-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub semester: u8,
    pub role: String,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub semester: u8,
    pub role: &'a str,
    pub profile_picture: Option<&'a str>,
}

/// A chat message joined with its sender's display fields.
#[derive(Clone)]
pub struct MessageRow {
    pub id: String,
    pub room: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_picture: Option<String>,
    pub body: String,
    pub kind: String,
    pub reply_to: Option<String>,
    pub is_edited: bool,
    pub edited_at: Option<String>,
    pub is_deleted: bool,
    pub created_at: String,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub room: &'a str,
    pub sender_id: &'a str,
    pub body: &'a str,
    pub kind: &'a str,
    pub reply_to: Option<&'a str>,
    pub created_at: &'a str,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
}

pub struct ReceiptRow {
    pub message_id: String,
    pub user_id: String,
    pub read_at: String,
}

/// A notification joined with its sender's display fields.
pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub sender_picture: Option<String>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub payload_kind: Option<String>,
    pub payload_id: Option<String>,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct NewNotification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub payload_kind: Option<String>,
    pub payload_id: Option<String>,
    pub created_at: String,
}
