//! Turns store rows into the resolved models clients receive.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use uuid::Uuid;

use studyhall_db::models::{MessageRow, NotificationRow};
use studyhall_db::{Database, parse_timestamp};
use studyhall_types::models::{
    ChatMessage, MessageKind, Notification, NotificationType, PayloadDetails, PayloadKind,
    PayloadRef, Reaction, ReadReceipt, ReplyPreview, Room, UserProfile,
};

const PREVIEW_CHARS: usize = 100;

/// Resolve a batch of message rows with reactions, read receipts and reply
/// previews, keeping the input order.
pub fn messages(db: &Database, rows: Vec<MessageRow>) -> Result<Vec<ChatMessage>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
    for r in db.get_reactions_for_messages(&ids)? {
        reactions.entry(r.message_id).or_default().push(Reaction {
            user_id: parse_id(&r.user_id)?,
            emoji: r.emoji,
        });
    }

    let mut receipts: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
    for r in db.get_receipts_for_messages(&ids)? {
        receipts.entry(r.message_id).or_default().push(ReadReceipt {
            user_id: parse_id(&r.user_id)?,
            read_at: parse_timestamp(&r.read_at)?,
        });
    }

    let reply_ids: Vec<String> = rows.iter().filter_map(|r| r.reply_to.clone()).collect();
    let mut replies: HashMap<String, ReplyPreview> = HashMap::new();
    for target in db.get_messages_by_ids(&reply_ids)? {
        replies.insert(
            target.id.clone(),
            ReplyPreview {
                id: parse_id(&target.id)?,
                sender: sender_of(&target)?,
                message: target.body,
            },
        );
    }

    rows.into_iter()
        .map(|row| {
            let reply_to = row.reply_to.as_ref().and_then(|id| replies.get(id).cloned());
            let reactions = reactions.remove(&row.id).unwrap_or_default();
            let read_by = receipts.remove(&row.id).unwrap_or_default();
            message(row, reply_to, reactions, read_by)
        })
        .collect()
}

pub fn message_one(db: &Database, row: MessageRow) -> Result<ChatMessage> {
    messages(db, vec![row])?
        .pop()
        .ok_or_else(|| anyhow!("message vanished while resolving"))
}

fn message(
    row: MessageRow,
    reply_to: Option<ReplyPreview>,
    reactions: Vec<Reaction>,
    read_by: Vec<ReadReceipt>,
) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: parse_id(&row.id)?,
        room: parse_room(&row.room)?,
        sender: sender_of(&row)?,
        message_type: MessageKind::parse(&row.kind)
            .ok_or_else(|| anyhow!("Corrupt kind '{}' on message '{}'", row.kind, row.id))?,
        reply_to,
        is_edited: row.is_edited,
        edited_at: row.edited_at.as_deref().map(parse_timestamp).transpose()?,
        is_deleted: row.is_deleted,
        reactions,
        read_by,
        created_at: parse_timestamp(&row.created_at)?,
        message: row.body,
    })
}

fn sender_of(row: &MessageRow) -> Result<UserProfile> {
    Ok(UserProfile {
        id: parse_id(&row.sender_id)?,
        name: row.sender_name.clone(),
        profile_picture: row.sender_picture.clone(),
    })
}

/// Display fields for a payload reference. Chat payloads pick up the room
/// and a body preview when the message still exists.
pub fn payload(db: &Database, payload: PayloadRef) -> Result<PayloadDetails> {
    let mut details = PayloadDetails {
        kind: payload.kind,
        id: payload.id,
        room: None,
        preview: None,
    };

    if payload.kind == PayloadKind::Chat {
        if let Some(row) = db.get_message(&payload.id.to_string())? {
            details.room = Some(parse_room(&row.room)?);
            details.preview = Some(row.body.chars().take(PREVIEW_CHARS).collect());
        }
    }

    Ok(details)
}

pub fn notification(db: &Database, row: NotificationRow) -> Result<Notification> {
    let sender = match row.sender_id.as_deref() {
        Some(id) => Some(UserProfile {
            id: parse_id(id)?,
            name: row.sender_name.clone().unwrap_or_else(|| "unknown".to_string()),
            profile_picture: row.sender_picture.clone(),
        }),
        None => None,
    };

    let payload_ref = match (row.payload_kind.as_deref(), row.payload_id.as_deref()) {
        (Some(kind), Some(id)) => Some(PayloadRef {
            kind: PayloadKind::parse(kind)
                .ok_or_else(|| anyhow!("Corrupt payload kind '{}' on notification '{}'", kind, row.id))?,
            id: parse_id(id)?,
        }),
        _ => None,
    };

    Ok(Notification {
        id: parse_id(&row.id)?,
        recipient_id: parse_id(&row.recipient_id)?,
        sender,
        kind: NotificationType::parse(&row.kind)
            .ok_or_else(|| anyhow!("Corrupt type '{}' on notification '{}'", row.kind, row.id))?,
        payload: payload_ref.map(|p| payload(db, p)).transpose()?,
        is_read: row.is_read,
        read_at: row.read_at.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&row.created_at)?,
        title: row.title,
        message: row.message,
    })
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().map_err(|e| anyhow!("Corrupt id '{}': {}", raw, e))
}

fn parse_room(raw: &str) -> Result<Room> {
    raw.parse().map_err(|e| anyhow!("Corrupt room: {}", e))
}

