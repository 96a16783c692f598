pub mod access;
pub mod auth;
pub mod broker;
pub mod cache;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod notifier;
pub mod resolve;

use std::sync::Arc;

use studyhall_db::Database;

/// Run a blocking store call off the async runtime.
pub async fn with_db<F, T>(db: &Arc<Database>, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&*db))
        .await
        .map_err(|e| anyhow::anyhow!("store task failed: {}", e))?
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    use studyhall_db::models::NewUser;
    use studyhall_db::{Database, timestamp};
    use studyhall_types::api::Claims;
    use studyhall_types::events::ServerEvent;
    use studyhall_types::models::{Role, Semester};

    use crate::auth::Identity;

    pub fn seed_user(db: &Database, name: &str, semester: u8, role: Role) -> Identity {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let email = format!("{}@campus.test", name);
        db.create_user(&NewUser {
            id: &id_str,
            name,
            email: &email,
            password_hash: "not-a-hash",
            semester,
            role: role.as_str(),
            profile_picture: None,
        })
        .unwrap();
        Identity {
            user_id: id,
            name: name.to_string(),
            semester: Semester::new(semester).unwrap(),
            role,
            profile_picture: None,
        }
    }

    pub fn token_for(secret: &str, who: &Identity, ttl_secs: i64) -> String {
        let claims = Claims {
            sub: who.user_id,
            name: who.name.clone(),
            exp: (Utc::now().timestamp() + ttl_secs) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    pub fn backdate_message(db: &Database, id: Uuid, minutes: i64) {
        let created = timestamp(Utc::now() - chrono::Duration::minutes(minutes));
        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE chat_messages SET created_at = ?1 WHERE id = ?2",
                (&created, id.to_string()),
            )?;
            Ok(())
        })
        .unwrap();
    }

    pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}
