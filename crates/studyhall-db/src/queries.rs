use crate::models::{MessageRow, NewMessage, NewUser, ReactionRow, ReceiptRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str =
    "id, name, email, password, semester, role, profile_picture, is_active, created_at";

// JOIN users to fetch sender display fields in a single query (no N+1)
const MESSAGE_SELECT: &str = "
    SELECT m.id, m.room, m.sender_id, u.name, u.profile_picture, m.body, m.kind,
           m.reply_to, m.is_edited, m.edited_at, m.is_deleted, m.created_at
    FROM chat_messages m
    LEFT JOIN users u ON m.sender_id = u.id";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, semester, role, profile_picture)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id,
                    user.name,
                    user.email,
                    user.password_hash,
                    user.semester,
                    user.role,
                    user.profile_picture,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Returns false when the user does not exist.
    pub fn set_user_active(&self, id: &str, active: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_active = ?1 WHERE id = ?2",
                rusqlite::params![active, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Active users of a semester, minus `exclude`.
    pub fn user_ids_in_semester(&self, semester: u8, exclude: Option<&str>) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM users
                 WHERE semester = ?1 AND is_active = 1 AND (?2 IS NULL OR id != ?2)
                 ORDER BY created_at",
            )?;
            let ids = stmt
                .query_map(rusqlite::params![semester, exclude], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, room, sender_id, body, kind, reply_to, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    msg.id,
                    msg.room,
                    msg.sender_id,
                    msg.body,
                    msg.kind,
                    msg.reply_to,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE m.id = ?1", MESSAGE_SELECT);
            conn.query_row(&sql, [id], message_from_row).optional()
        })
    }

    pub fn get_messages_by_ids(&self, ids: &[String]) -> Result<Vec<MessageRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!("{} WHERE m.id IN ({})", MESSAGE_SELECT, placeholders(ids.len()));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Overwrites the body of a live message. Returns false if the message is
    /// missing or already deleted.
    pub fn update_message_body(&self, id: &str, body: &str, edited_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE chat_messages SET body = ?1, is_edited = 1, edited_at = ?2
                 WHERE id = ?3 AND is_deleted = 0",
                rusqlite::params![body, edited_at, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Soft delete: the row stays, the body becomes `tombstone`.
    /// Returns false if the message is missing or already deleted.
    pub fn soft_delete_message(&self, id: &str, tombstone: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE chat_messages SET body = ?1, is_deleted = 1
                 WHERE id = ?2 AND is_deleted = 0",
                rusqlite::params![tombstone, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// One page of a room's history, newest first.
    pub fn get_messages_page(&self, room: &str, limit: u32, offset: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.room = ?1 ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?2 OFFSET ?3",
                MESSAGE_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![room, limit, offset], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Live messages in `room` from other users that `user_id` has not read.
    pub fn count_unread_messages(&self, room: &str, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chat_messages m
                 WHERE m.room = ?1 AND m.is_deleted = 0 AND m.sender_id != ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM message_reads r
                       WHERE r.message_id = m.id AND r.user_id = ?2
                   )",
                rusqlite::params![room, user_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    // -- Reactions --

    /// Toggle a (user, emoji) reaction in one transaction: removes it if
    /// present, inserts it otherwise. Returns whether it was added plus the
    /// message's full reaction list in insertion order.
    pub fn toggle_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
        created_at: &str,
    ) -> Result<(bool, Vec<ReactionRow>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let removed = tx.execute(
                "DELETE FROM message_reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                rusqlite::params![message_id, user_id, emoji],
            )?;

            let added = removed == 0;
            if added {
                tx.execute(
                    "INSERT INTO message_reactions (message_id, user_id, emoji, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![message_id, user_id, emoji, created_at],
                )?;
            }

            let reactions = query_reactions(&tx, &[message_id.to_string()])?;
            tx.commit()?;
            Ok((added, reactions))
        })
    }

    /// Batch-fetch reactions for a set of message IDs, in insertion order.
    pub fn get_reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| query_reactions(conn, message_ids))
    }

    // -- Read receipts --

    /// Record that `user_id` read a message. At most one receipt per user:
    /// returns false if one already existed.
    pub fn mark_message_read(&self, message_id: &str, user_id: &str, read_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![message_id, user_id, read_at],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_receipts_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReceiptRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id, read_at FROM message_reads
                 WHERE message_id IN ({}) ORDER BY read_at",
                placeholders(message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(message_ids.iter()), |row| {
                    Ok(ReceiptRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        read_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            semester: row.get(4)?,
            role: row.get(5)?,
            profile_picture: row.get(6)?,
            is_active: row.get(7)?,
            created_at: row.get(8)?,
        })
    })
    .optional()
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        room: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        sender_picture: row.get(4)?,
        body: row.get(5)?,
        kind: row.get(6)?,
        reply_to: row.get(7)?,
        is_edited: row.get(8)?,
        edited_at: row.get(9)?,
        is_deleted: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn query_reactions(conn: &Connection, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
    let sql = format!(
        "SELECT message_id, user_id, emoji FROM message_reactions
         WHERE message_id IN ({}) ORDER BY rowid",
        placeholders(message_ids.len())
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(message_ids.iter()), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                emoji: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::timestamp;
    use chrono::Utc;
    use uuid::Uuid;

    pub(crate) fn seed_user(db: &Database, name: &str, semester: u8) -> String {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}@campus.test", name);
        db.create_user(&NewUser {
            id: &id,
            name,
            email: &email,
            password_hash: "x",
            semester,
            role: "student",
            profile_picture: None,
        })
        .unwrap();
        id
    }

    pub(crate) fn seed_message(db: &Database, room: &str, sender: &str, body: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_message(&NewMessage {
            id: &id,
            room,
            sender_id: sender,
            body,
            kind: "text",
            reply_to: None,
            created_at: &timestamp(Utc::now()),
        })
        .unwrap();
        id
    }

    #[test]
    fn user_lookup_and_deactivation() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_user(&db, "ana", 3);

        let user = db.get_user_by_email("ana@campus.test").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.semester, 3);
        assert!(user.is_active);

        assert!(db.set_user_active(&id, false).unwrap());
        assert!(!db.get_user_by_id(&id).unwrap().unwrap().is_active);
        assert!(!db.set_user_active("missing", false).unwrap());
    }

    #[test]
    fn semester_members_skip_excluded_and_inactive() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a", 2);
        let b = seed_user(&db, "b", 2);
        let c = seed_user(&db, "c", 2);
        seed_user(&db, "d", 5);
        db.set_user_active(&c, false).unwrap();

        let ids = db.user_ids_in_semester(2, Some(&a)).unwrap();
        assert_eq!(ids, vec![b]);
    }

    #[test]
    fn reaction_toggle_is_pairwise() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a", 1);
        let b = seed_user(&db, "b", 1);
        let msg = seed_message(&db, "general", &a, "hi");
        let now = timestamp(Utc::now());

        let (added, list) = db.toggle_reaction(&msg, &b, "👍", &now).unwrap();
        assert!(added);
        assert_eq!(list.len(), 1);

        db.toggle_reaction(&msg, &a, "👍", &now).unwrap();
        let (added, list) = db.toggle_reaction(&msg, &b, "👍", &now).unwrap();
        assert!(!added);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user_id, a);
    }

    #[test]
    fn reactions_keep_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a", 1);
        let msg = seed_message(&db, "general", &a, "hi");
        let now = timestamp(Utc::now());

        for emoji in ["🔥", "👍", "🎉"] {
            db.toggle_reaction(&msg, &a, emoji, &now).unwrap();
        }
        let emojis: Vec<String> = db
            .get_reactions_for_messages(&[msg])
            .unwrap()
            .into_iter()
            .map(|r| r.emoji)
            .collect();
        assert_eq!(emojis, vec!["🔥", "👍", "🎉"]);
    }

    #[test]
    fn soft_delete_keeps_row_and_blocks_edit() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a", 1);
        let msg = seed_message(&db, "general", &a, "hi");

        assert!(db.soft_delete_message(&msg, "gone").unwrap());
        assert!(!db.soft_delete_message(&msg, "gone").unwrap());

        let row = db.get_message(&msg).unwrap().unwrap();
        assert!(row.is_deleted);
        assert_eq!(row.body, "gone");
        assert!(!db.update_message_body(&msg, "back", &timestamp(Utc::now())).unwrap());
    }

    #[test]
    fn read_receipts_are_unique_per_user() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a", 4);
        let b = seed_user(&db, "b", 4);
        let m1 = seed_message(&db, "semester-4", &a, "one");
        seed_message(&db, "semester-4", &a, "two");

        assert_eq!(db.count_unread_messages("semester-4", &b).unwrap(), 2);
        assert_eq!(db.count_unread_messages("semester-4", &a).unwrap(), 0);

        let now = timestamp(Utc::now());
        assert!(db.mark_message_read(&m1, &b, &now).unwrap());
        assert!(!db.mark_message_read(&m1, &b, &now).unwrap());
        assert_eq!(db.get_receipts_for_messages(&[m1]).unwrap().len(), 1);
        assert_eq!(db.count_unread_messages("semester-4", &b).unwrap(), 1);
    }

    #[test]
    fn history_pages_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a", 1);
        for i in 0..5 {
            seed_message(&db, "general", &a, &format!("m{}", i));
        }
        seed_message(&db, "semester-1", &a, "elsewhere");

        let first = db.get_messages_page("general", 2, 0).unwrap();
        let bodies: Vec<_> = first.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m4", "m3"]);

        let last = db.get_messages_page("general", 2, 4).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].body, "m0");
        assert_eq!(last[0].sender_name, "a");
    }
}
