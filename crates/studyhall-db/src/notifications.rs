use crate::Database;
use crate::models::{NewNotification, NotificationRow};
use crate::queries::OptionalExt;
use anyhow::Result;
use rusqlite::{Connection, Row};

const NOTIFICATION_SELECT: &str = "
    SELECT n.id, n.recipient_id, n.sender_id, u.name, u.profile_picture, n.kind, n.title,
           n.message, n.payload_kind, n.payload_id, n.is_read, n.read_at, n.created_at
    FROM notifications n
    LEFT JOIN users u ON n.sender_id = u.id";

impl Database {
    pub fn insert_notification(&self, n: &NewNotification) -> Result<()> {
        self.with_conn_mut(|conn| insert(conn, n))
    }

    /// Insert a batch of notifications atomically.
    pub fn insert_notifications(&self, batch: &[NewNotification]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for n in batch {
                insert(&tx, n)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE n.id = ?1", NOTIFICATION_SELECT);
            conn.query_row(&sql, [id], notification_from_row).optional()
        })
    }

    /// A page of a user's notifications, newest first.
    pub fn list_notifications(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE n.recipient_id = ?1 AND (?2 = 0 OR n.is_read = 0)
                 ORDER BY n.created_at DESC, n.rowid DESC LIMIT ?3 OFFSET ?4",
                NOTIFICATION_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![recipient_id, unread_only, limit, offset],
                    notification_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_unread_notifications(&self, recipient_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
                [recipient_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    /// Flip one notification to read. Scoped to the recipient; returns false
    /// if no such notification belongs to them. Already-read rows keep their
    /// original read timestamp.
    pub fn mark_notification_read(&self, id: &str, recipient_id: &str, read_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?1)
                 WHERE id = ?2 AND recipient_id = ?3",
                rusqlite::params![read_at, id, recipient_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, recipient_id: &str, read_at: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1, read_at = ?1
                 WHERE recipient_id = ?2 AND is_read = 0",
                rusqlite::params![read_at, recipient_id],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_notification(&self, id: &str, recipient_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND recipient_id = ?2",
                rusqlite::params![id, recipient_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Read-sweep: drop every read notification of a recipient.
    pub fn delete_read_notifications(&self, recipient_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE recipient_id = ?1 AND is_read = 1",
                [recipient_id],
            )?;
            Ok(deleted)
        })
    }
}

fn insert(conn: &Connection, n: &NewNotification) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications
            (id, recipient_id, sender_id, kind, title, message, payload_kind, payload_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            n.id,
            n.recipient_id,
            n.sender_id,
            n.kind,
            n.title,
            n.message,
            n.payload_kind,
            n.payload_id,
            n.created_at,
        ],
    )?;
    Ok(())
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get(3)?,
        sender_picture: row.get(4)?,
        kind: row.get(5)?,
        title: row.get(6)?,
        message: row.get(7)?,
        payload_kind: row.get(8)?,
        payload_id: row.get(9)?,
        is_read: row.get(10)?,
        read_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}
