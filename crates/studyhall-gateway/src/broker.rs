use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use studyhall_db::models::{MessageRow, NewMessage};
use studyhall_db::{Database, parse_timestamp, timestamp};
use studyhall_types::api::HistoryResponse;
use studyhall_types::events::ServerEvent;
use studyhall_types::models::{
    ChatMessage, DELETED_MESSAGE_BODY, EDIT_WINDOW_MINUTES, MAX_MESSAGE_LEN, MessageKind, Reaction,
    Room,
};

use crate::access::RoomAccess;
use crate::auth::Identity;
use crate::dispatcher::{ConnId, Dispatcher};
use crate::error::ChatError;
use crate::resolve;
use crate::with_db;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

const MAX_EMOJI_BYTES: usize = 32;

/// Receives chat events, persists them and re-broadcasts to the right room.
#[derive(Clone)]
pub struct Broker {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl Broker {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub async fn send(
        &self,
        sender: &Identity,
        room: &str,
        body: &str,
        kind: MessageKind,
        reply_to: Option<Uuid>,
    ) -> Result<ChatMessage, ChatError> {
        let room = sender.authorize_raw(room)?;
        let body = validate_body(body)?;

        if let Some(reply_id) = reply_to {
            let target = self.load(reply_id).await?.ok_or(ChatError::ReplyNotFound)?;
            if target.room != room.to_string() {
                return Err(ChatError::ReplyNotFound);
            }
        }

        let id = Uuid::new_v4().to_string();
        let room_key = room.to_string();
        let sender_id = sender.user_id.to_string();
        let reply = reply_to.map(|r| r.to_string());
        let created_at = timestamp(Utc::now());

        let message = with_db(&self.db, move |db| {
            db.insert_message(&NewMessage {
                id: &id,
                room: &room_key,
                sender_id: &sender_id,
                body: &body,
                kind: kind.as_str(),
                reply_to: reply.as_deref(),
                created_at: &created_at,
            })?;
            let row = db
                .get_message(&id)?
                .ok_or_else(|| anyhow::anyhow!("message {} missing after insert", id))?;
            resolve::message_one(db, row)
        })
        .await?;

        let delivered = self
            .dispatcher
            .publish(&room, ServerEvent::NewMessage(message.clone()))
            .await;
        debug!("{} posted {} to {} ({} recipients)", sender.name, message.id, room, delivered);

        Ok(message)
    }

    pub async fn edit(
        &self,
        caller: &Identity,
        message_id: Uuid,
        new_body: &str,
    ) -> Result<ChatMessage, ChatError> {
        let (row, room) = self.load_visible(caller, message_id).await?;

        if row.is_deleted {
            return Err(ChatError::MessageDeleted);
        }
        if row.sender_id != caller.user_id.to_string() {
            return Err(ChatError::NotYourMessage);
        }
        check_edit_window(parse_timestamp(&row.created_at)?, Utc::now())?;
        let body = validate_body(new_body)?;

        let edited_at = timestamp(Utc::now());
        let id = row.id.clone();
        let message = with_db(&self.db, move |db| {
            if !db.update_message_body(&id, &body, &edited_at)? {
                return Ok(None);
            }
            match db.get_message(&id)? {
                Some(row) => resolve::message_one(db, row).map(Some),
                None => Ok(None),
            }
        })
        .await?
        // Deleted between the check and the update
        .ok_or(ChatError::MessageDeleted)?;

        self.dispatcher
            .publish(&room, ServerEvent::MessageEdited(message.clone()))
            .await;
        Ok(message)
    }

    /// Soft delete by the sender or an admin. The row is kept with a tombstone body.
    pub async fn delete(&self, caller: &Identity, message_id: Uuid) -> Result<(), ChatError> {
        let (row, room) = self.load_visible(caller, message_id).await?;

        if row.is_deleted {
            return Err(ChatError::MessageDeleted);
        }
        if row.sender_id != caller.user_id.to_string() && !caller.is_admin() {
            return Err(ChatError::DeleteForbidden);
        }

        let id = row.id.clone();
        let deleted = with_db(&self.db, move |db| db.soft_delete_message(&id, DELETED_MESSAGE_BODY)).await?;
        if !deleted {
            return Err(ChatError::MessageDeleted);
        }

        info!("{} deleted message {} in {}", caller.name, message_id, room);
        self.dispatcher
            .publish(&room, ServerEvent::MessageDeleted { message_id, room })
            .await;
        Ok(())
    }

    /// Toggle the caller's `emoji` reaction and broadcast the full list.
    pub async fn react(
        &self,
        caller: &Identity,
        message_id: Uuid,
        emoji: &str,
    ) -> Result<Vec<Reaction>, ChatError> {
        let (row, room) = self.load_visible(caller, message_id).await?;

        if row.is_deleted {
            return Err(ChatError::MessageDeleted);
        }
        let emoji = validate_emoji(emoji)?.to_string();

        let id = row.id.clone();
        let user_id = caller.user_id.to_string();
        let now = timestamp(Utc::now());
        let (added, rows) = with_db(&self.db, move |db| db.toggle_reaction(&id, &user_id, &emoji, &now)).await?;

        let reactions = rows
            .into_iter()
            .map(|r| -> anyhow::Result<Reaction> {
                Ok(Reaction {
                    user_id: resolve::parse_id(&r.user_id)?,
                    emoji: r.emoji,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        debug!(
            "{} {} a reaction on {}",
            caller.name,
            if added { "added" } else { "removed" },
            message_id
        );
        self.dispatcher
            .publish(
                &room,
                ServerEvent::ReactionUpdated {
                    message_id,
                    reactions: reactions.clone(),
                },
            )
            .await;
        Ok(reactions)
    }

    /// Fire-and-forget typing signal, never persisted.
    pub async fn typing(
        &self,
        caller: &Identity,
        conn_id: ConnId,
        room: &str,
        is_typing: bool,
    ) -> Result<(), ChatError> {
        let room = caller.authorize_raw(room)?;
        self.dispatcher
            .publish_except(
                &room,
                ServerEvent::UserTyping {
                    user_id: caller.user_id,
                    user_name: caller.name.clone(),
                    is_typing,
                },
                conn_id,
            )
            .await;
        Ok(())
    }

    /// Record a read receipt. Returns true only for the caller's first read;
    /// own and deleted messages are ignored.
    pub async fn mark_read(&self, caller: &Identity, message_id: Uuid) -> Result<bool, ChatError> {
        let (row, room) = self.load_visible(caller, message_id).await?;

        if row.is_deleted || row.sender_id == caller.user_id.to_string() {
            return Ok(false);
        }

        let read_at = Utc::now();
        let id = row.id.clone();
        let user_id = caller.user_id.to_string();
        let stamp = timestamp(read_at);
        let first = with_db(&self.db, move |db| db.mark_message_read(&id, &user_id, &stamp)).await?;

        if first {
            self.dispatcher
                .publish(
                    &room,
                    ServerEvent::MessageRead {
                        message_id,
                        user_id: caller.user_id,
                        read_at,
                    },
                )
                .await;
        }
        Ok(first)
    }

    /// Paginated room history. Pages are counted from the newest message;
    /// each page is returned oldest first. Deleted messages keep their slot
    /// with the tombstone body.
    pub async fn history(
        &self,
        caller: &Identity,
        room: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<HistoryResponse, ChatError> {
        let room = caller.authorize_raw(room)?;
        let (page, limit) = page_bounds(page, limit);
        let offset = (page - 1).saturating_mul(limit);

        let room_key = room.to_string();
        let (mut messages, has_more) = with_db(&self.db, move |db| {
            let mut rows = db.get_messages_page(&room_key, limit + 1, offset)?;
            let has_more = rows.len() > limit as usize;
            rows.truncate(limit as usize);
            Ok((resolve::messages(db, rows)?, has_more))
        })
        .await?;
        messages.reverse();

        Ok(HistoryResponse {
            messages,
            page,
            limit,
            has_more,
        })
    }

    pub async fn unread_count(&self, caller: &Identity, room: &str) -> Result<u64, ChatError> {
        let room = caller.authorize_raw(room)?.to_string();
        let user_id = caller.user_id.to_string();
        Ok(with_db(&self.db, move |db| db.count_unread_messages(&room, &user_id)).await?)
    }

    /// Load a message the caller may see. Messages in rooms outside the
    /// caller's reach are reported as missing.
    async fn load_visible(
        &self,
        caller: &Identity,
        message_id: Uuid,
    ) -> Result<(MessageRow, Room), ChatError> {
        let row = self.load(message_id).await?.ok_or(ChatError::MessageNotFound)?;
        let room = room_of(&row)?;
        if !caller.can_access(&room) {
            return Err(ChatError::MessageNotFound);
        }
        Ok((row, room))
    }

    async fn load(&self, message_id: Uuid) -> Result<Option<MessageRow>, ChatError> {
        let id = message_id.to_string();
        Ok(with_db(&self.db, move |db| db.get_message(&id)).await?)
    }
}

fn room_of(row: &MessageRow) -> Result<Room, ChatError> {
    row.room
        .parse()
        .map_err(|e| ChatError::Storage(anyhow::anyhow!("Corrupt room on message '{}': {}", row.id, e)))
}

/// Clamp caller-supplied paging to (page >= 1, 1 <= limit <= MAX_PAGE_SIZE).
pub fn page_bounds(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Trimmed body, 1..=MAX_MESSAGE_LEN characters.
pub fn validate_body(body: &str) -> Result<String, ChatError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if body.chars().count() > MAX_MESSAGE_LEN {
        return Err(ChatError::MessageTooLong);
    }
    Ok(body.to_string())
}

/// Accepts a single emoji sequence: short, no whitespace or control
/// characters, at least one non-ASCII character.
pub fn validate_emoji(emoji: &str) -> Result<&str, ChatError> {
    let ok = !emoji.is_empty()
        && emoji.len() <= MAX_EMOJI_BYTES
        && !emoji.chars().any(|c| c.is_whitespace() || c.is_control())
        && emoji.chars().any(|c| !c.is_ascii());
    if ok { Ok(emoji) } else { Err(ChatError::InvalidEmoji) }
}

pub fn check_edit_window(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ChatError> {
    if now.signed_duration_since(created_at) > chrono::Duration::minutes(EDIT_WINDOW_MINUTES) {
        Err(ChatError::EditWindowExpired)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{backdate_message, drain, seed_user};
    use studyhall_types::models::{Role, Semester};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        db: Arc<Database>,
        dispatcher: Dispatcher,
        broker: Broker,
    }

    impl Harness {
        fn new() -> Self {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let dispatcher = Dispatcher::new();
            let broker = Broker::new(db.clone(), dispatcher.clone());
            Self { db, dispatcher, broker }
        }

        async fn connect(&self, who: &Identity) -> (ConnId, UnboundedReceiver<ServerEvent>) {
            self.dispatcher
                .register(
                    who.user_id,
                    &[Room::General, who.semester_room(), who.private_room()],
                )
                .await
        }
    }

    fn sem(n: u8) -> Room {
        Room::Semester(Semester::new(n).unwrap())
    }

    #[tokio::test]
    async fn send_reaches_own_semester_room_only() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let cara = seed_user(&h.db, "cara", 3, Role::Student);
        let dev = seed_user(&h.db, "dev", 4, Role::Student);
        let (_, mut rx_ana) = h.connect(&ana).await;
        let (_, mut rx_cara) = h.connect(&cara).await;
        let (_, mut rx_dev) = h.connect(&dev).await;

        let sent = h
            .broker
            .send(&ana, "3", "hello", MessageKind::Text, None)
            .await
            .unwrap();
        assert_eq!(sent.room, sem(3));

        for rx in [&mut rx_ana, &mut rx_cara] {
            match drain(rx).as_slice() {
                [ServerEvent::NewMessage(m)] => {
                    assert_eq!(m.message, "hello");
                    assert_eq!(m.sender.name, "ana");
                    assert_eq!(m.sender.id, ana.user_id);
                }
                other => panic!("expected one new-message, got {:?}", other),
            }
        }
        assert!(drain(&mut rx_dev).is_empty());
    }

    #[tokio::test]
    async fn send_to_foreign_semester_is_rejected_without_broadcast() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let dev = seed_user(&h.db, "dev", 4, Role::Student);
        let (_, mut rx_dev) = h.connect(&dev).await;

        let err = h
            .broker
            .send(&ana, "semester-4", "sneaky", MessageKind::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::RoomForbidden));
        assert!(drain(&mut rx_dev).is_empty());

        let history = h.broker.history(&dev, "4", None, None).await.unwrap();
        assert!(history.messages.is_empty());
    }

    #[tokio::test]
    async fn send_validates_body() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);

        let empty = h.broker.send(&ana, "general", "   ", MessageKind::Text, None).await;
        assert!(matches!(empty, Err(ChatError::EmptyMessage)));

        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        let long = h.broker.send(&ana, "general", &long, MessageKind::Text, None).await;
        assert!(matches!(long, Err(ChatError::MessageTooLong)));

        let exact = "é".repeat(MAX_MESSAGE_LEN);
        assert!(h.broker.send(&ana, "general", &exact, MessageKind::Text, None).await.is_ok());
    }

    #[tokio::test]
    async fn reply_resolves_preview_from_same_room() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let ben = seed_user(&h.db, "ben", 3, Role::Student);

        let original = h.broker.send(&ana, "3", "question?", MessageKind::Text, None).await.unwrap();
        let reply = h
            .broker
            .send(&ben, "semester-3", "answer", MessageKind::Text, Some(original.id))
            .await
            .unwrap();
        let preview = reply.reply_to.unwrap();
        assert_eq!(preview.id, original.id);
        assert_eq!(preview.message, "question?");
        assert_eq!(preview.sender.name, "ana");

        let cross_room = h
            .broker
            .send(&ben, "general", "answer", MessageKind::Text, Some(original.id))
            .await;
        assert!(matches!(cross_room, Err(ChatError::ReplyNotFound)));
    }

    #[tokio::test]
    async fn edit_within_window_by_sender() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let ben = seed_user(&h.db, "ben", 3, Role::Student);
        let (_, mut rx_ben) = h.connect(&ben).await;
        let msg = h.broker.send(&ana, "3", "helo", MessageKind::Text, None).await.unwrap();
        drain(&mut rx_ben);

        let not_mine = h.broker.edit(&ben, msg.id, "hijack").await;
        assert!(matches!(not_mine, Err(ChatError::NotYourMessage)));

        let edited = h.broker.edit(&ana, msg.id, "hello").await.unwrap();
        assert!(edited.is_edited);
        assert!(edited.edited_at.is_some());
        assert!(matches!(
            drain(&mut rx_ben).as_slice(),
            [ServerEvent::MessageEdited(m)] if m.message == "hello"
        ));
    }

    #[tokio::test]
    async fn edit_after_window_is_rejected_and_body_kept() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let (_, mut rx_ana) = h.connect(&ana).await;
        let msg = h.broker.send(&ana, "3", "hello", MessageKind::Text, None).await.unwrap();
        backdate_message(&h.db, msg.id, 16);
        drain(&mut rx_ana);

        let err = h.broker.edit(&ana, msg.id, "changed").await.unwrap_err();
        assert_eq!(err.to_string(), "edit window expired");
        assert!(drain(&mut rx_ana).is_empty());

        let stored = h.db.get_message(&msg.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.body, "hello");
        assert!(!stored.is_edited);
    }

    #[test]
    fn edit_window_boundary() {
        let created = Utc::now();
        let limit = created + chrono::Duration::minutes(EDIT_WINDOW_MINUTES);
        assert!(check_edit_window(created, limit).is_ok());
        assert!(check_edit_window(created, limit + chrono::Duration::seconds(1)).is_err());
    }

    #[tokio::test]
    async fn delete_is_soft_and_blocks_later_edits() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let ben = seed_user(&h.db, "ben", 3, Role::Student);
        let (_, mut rx_ben) = h.connect(&ben).await;
        let msg = h.broker.send(&ana, "3", "oops", MessageKind::Text, None).await.unwrap();
        drain(&mut rx_ben);

        assert!(matches!(
            h.broker.delete(&ben, msg.id).await,
            Err(ChatError::DeleteForbidden)
        ));
        h.broker.delete(&ana, msg.id).await.unwrap();

        match drain(&mut rx_ben).as_slice() {
            [ServerEvent::MessageDeleted { message_id, room }] => {
                assert_eq!(*message_id, msg.id);
                assert_eq!(*room, sem(3));
            }
            other => panic!("expected message-deleted, got {:?}", other),
        }

        let stored = h.db.get_message(&msg.id.to_string()).unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.body, DELETED_MESSAGE_BODY);

        assert!(matches!(
            h.broker.edit(&ana, msg.id, "fixed").await,
            Err(ChatError::MessageDeleted)
        ));
        assert!(matches!(
            h.broker.react(&ben, msg.id, "👍").await,
            Err(ChatError::MessageDeleted)
        ));

        let history = h.broker.history(&ben, "3", None, None).await.unwrap();
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].message, DELETED_MESSAGE_BODY);
    }

    #[tokio::test]
    async fn admin_may_delete_others_messages() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 2, Role::Student);
        let mod_ = seed_user(&h.db, "mod", 2, Role::Admin);
        let msg = h.broker.send(&ana, "general", "spam", MessageKind::Text, None).await.unwrap();

        h.broker.delete(&mod_, msg.id).await.unwrap();
        assert!(matches!(
            h.broker.delete(&mod_, msg.id).await,
            Err(ChatError::MessageDeleted)
        ));
    }

    #[tokio::test]
    async fn reacting_twice_removes_the_pair() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let ben = seed_user(&h.db, "ben", 3, Role::Student);
        let (_, mut rx_ana) = h.connect(&ana).await;
        let msg = h.broker.send(&ana, "3", "hello", MessageKind::Text, None).await.unwrap();

        h.broker.react(&ana, msg.id, "🎉").await.unwrap();
        let first = h.broker.react(&ben, msg.id, "👍").await.unwrap();
        assert_eq!(first.len(), 2);
        let second = h.broker.react(&ben, msg.id, "👍").await.unwrap();
        assert_eq!(
            second,
            vec![Reaction {
                user_id: ana.user_id,
                emoji: "🎉".into()
            }]
        );

        let last = drain(&mut rx_ana).into_iter().last().unwrap();
        match last {
            ServerEvent::ReactionUpdated { message_id, reactions } => {
                assert_eq!(message_id, msg.id);
                assert!(!reactions.iter().any(|r| r.user_id == ben.user_id && r.emoji == "👍"));
            }
            other => panic!("expected reaction-updated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_emoji_is_not_persisted() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let msg = h.broker.send(&ana, "3", "hello", MessageKind::Text, None).await.unwrap();

        for bad in ["", "ok", "👍 👍", "👍".repeat(10).as_str()] {
            assert!(matches!(
                h.broker.react(&ana, msg.id, bad).await,
                Err(ChatError::InvalidEmoji)
            ));
        }
        assert!(h.db.get_reactions_for_messages(&[msg.id.to_string()]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_room_messages_look_missing() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let dev = seed_user(&h.db, "dev", 4, Role::Student);
        let msg = h.broker.send(&ana, "3", "hello", MessageKind::Text, None).await.unwrap();

        assert!(matches!(h.broker.react(&dev, msg.id, "👍").await, Err(ChatError::MessageNotFound)));
        assert!(matches!(h.broker.mark_read(&dev, msg.id).await, Err(ChatError::MessageNotFound)));
        assert!(matches!(h.broker.delete(&dev, msg.id).await, Err(ChatError::MessageNotFound)));
        assert!(matches!(h.broker.edit(&dev, msg.id, "x").await, Err(ChatError::MessageNotFound)));
        assert!(h.db.get_reactions_for_messages(&[msg.id.to_string()]).unwrap().is_empty());
        assert!(!h.db.get_message(&msg.id.to_string()).unwrap().unwrap().is_deleted);
        assert!(matches!(
            h.broker.edit(&ana, Uuid::new_v4(), "x").await,
            Err(ChatError::MessageNotFound)
        ));
    }

    #[tokio::test]
    async fn typing_skips_the_typist() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let ben = seed_user(&h.db, "ben", 3, Role::Student);
        let (conn_ana, mut rx_ana) = h.connect(&ana).await;
        let (_, mut rx_ben) = h.connect(&ben).await;

        h.broker.typing(&ana, conn_ana, "3", true).await.unwrap();
        assert!(drain(&mut rx_ana).is_empty());
        assert!(matches!(
            drain(&mut rx_ben).as_slice(),
            [ServerEvent::UserTyping { is_typing: true, user_name, .. }] if user_name == "ana"
        ));

        assert!(h.broker.typing(&ana, conn_ana, "4", false).await.is_err());
    }

    #[tokio::test]
    async fn read_receipts_once_per_user() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 3, Role::Student);
        let ben = seed_user(&h.db, "ben", 3, Role::Student);
        let msg = h.broker.send(&ana, "3", "hello", MessageKind::Text, None).await.unwrap();

        assert_eq!(h.broker.unread_count(&ben, "3").await.unwrap(), 1);
        assert!(h.broker.mark_read(&ben, msg.id).await.unwrap());
        assert!(!h.broker.mark_read(&ben, msg.id).await.unwrap());
        assert!(!h.broker.mark_read(&ana, msg.id).await.unwrap());
        assert_eq!(h.broker.unread_count(&ben, "3").await.unwrap(), 0);

        let history = h.broker.history(&ana, "3", None, None).await.unwrap();
        assert_eq!(history.messages[0].read_by.len(), 1);
        assert_eq!(history.messages[0].read_by[0].user_id, ben.user_id);
    }

    #[tokio::test]
    async fn history_pages_are_oldest_first() {
        let h = Harness::new();
        let ana = seed_user(&h.db, "ana", 1, Role::Student);
        for i in 0..5 {
            h.broker
                .send(&ana, "general", &format!("m{}", i), MessageKind::Text, None)
                .await
                .unwrap();
        }

        let newest = h.broker.history(&ana, "general", Some(1), Some(2)).await.unwrap();
        let bodies: Vec<_> = newest.messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["m3", "m4"]);
        assert!(newest.has_more);

        let oldest = h.broker.history(&ana, "general", Some(3), Some(2)).await.unwrap();
        assert_eq!(oldest.messages.len(), 1);
        assert!(!oldest.has_more);
    }

    #[test]
    fn paging_bounds() {
        assert_eq!(page_bounds(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(page_bounds(Some(0), Some(0)), (1, 1));
        assert_eq!(page_bounds(Some(4), Some(10_000)), (4, MAX_PAGE_SIZE));
    }
}
