use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            semester        INTEGER NOT NULL CHECK (semester BETWEEN 1 AND 8),
            role            TEXT NOT NULL DEFAULT 'student',
            profile_picture TEXT,
            is_active       INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_semester
            ON users(semester, is_active);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            room        TEXT NOT NULL,
            sender_id   TEXT NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'text',
            reply_to    TEXT REFERENCES chat_messages(id),
            is_edited   INTEGER NOT NULL DEFAULT 0,
            edited_at   TEXT,
            is_deleted  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_room
            ON chat_messages(room, created_at);

        -- One row per (message, user, emoji); rowid gives insertion order
        CREATE TABLE IF NOT EXISTS message_reactions (
            message_id  TEXT NOT NULL REFERENCES chat_messages(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_message_reactions_message
            ON message_reactions(message_id);

        CREATE TABLE IF NOT EXISTS message_reads (
            message_id  TEXT NOT NULL REFERENCES chat_messages(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            read_at     TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id            TEXT PRIMARY KEY,
            recipient_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            sender_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
            kind          TEXT NOT NULL,
            title         TEXT NOT NULL,
            message       TEXT NOT NULL,
            payload_kind  TEXT,
            payload_id    TEXT,
            is_read       INTEGER NOT NULL DEFAULT 0,
            read_at       TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient_id, is_read, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
