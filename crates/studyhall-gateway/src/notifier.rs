use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use studyhall_db::models::NewNotification;
use studyhall_db::{Database, timestamp};
use studyhall_types::api::NotificationListResponse;
use studyhall_types::events::ServerEvent;
use studyhall_types::models::{
    MAX_MESSAGE_LEN, Notification, NotificationType, PayloadRef, Semester,
};

use crate::auth::Identity;
use crate::broker::page_bounds;
use crate::dispatcher::Dispatcher;
use crate::error::ChatError;
use crate::resolve;
use crate::with_db;

const MAX_TITLE_LEN: usize = 200;

/// What a producing workflow wants to tell a user.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub payload: Option<PayloadRef>,
}

impl NotificationDraft {
    fn validate(&self, sender: Option<&Identity>) -> Result<(String, String), ChatError> {
        let title = self.title.trim();
        let message = self.message.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ChatError::InvalidNotification("title must be 1-200 characters"));
        }
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_LEN {
            return Err(ChatError::InvalidNotification("message must be 1-1000 characters"));
        }
        if self.kind == NotificationType::AdminMessage && !sender.is_some_and(Identity::is_admin) {
            return Err(ChatError::AdminRequired);
        }
        Ok((title.to_string(), message.to_string()))
    }
}

/// Persists notifications and pushes them to the recipient's private room.
///
/// The stored row is the source of truth; the push is attempted once and is
/// simply dropped when the recipient has no live connection.
#[derive(Clone)]
pub struct Notifier {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl Notifier {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub async fn create(
        &self,
        sender: Option<&Identity>,
        recipient_id: Uuid,
        draft: NotificationDraft,
    ) -> Result<Notification, ChatError> {
        let (title, message) = draft.validate(sender)?;

        let now = Utc::now();
        let row = NewNotification {
            id: Uuid::new_v4().to_string(),
            recipient_id: recipient_id.to_string(),
            sender_id: sender.map(|s| s.user_id.to_string()),
            kind: draft.kind.as_str().to_string(),
            title,
            message,
            payload_kind: draft.payload.map(|p| p.kind.as_str().to_string()),
            payload_id: draft.payload.map(|p| p.id.to_string()),
            created_at: timestamp(now),
        };

        let stored = with_db(&self.db, move |db| {
            if db.get_user_by_id(&row.recipient_id)?.is_none() {
                return Ok(None);
            }
            db.insert_notification(&row)?;
            let stored = db
                .get_notification(&row.id)?
                .ok_or_else(|| anyhow::anyhow!("notification {} missing after insert", row.id))?;
            resolve::notification(db, stored).map(Some)
        })
        .await?
        .ok_or(ChatError::RecipientNotFound)?;

        let pushed = self.push(&stored).await;
        debug!("Notification {} for {} (delivered to {} connections)", stored.id, recipient_id, pushed);
        Ok(stored)
    }

    /// Fan a notification out to every active user of a semester except the
    /// sender. All rows are written in one transaction, then each recipient
    /// gets one push attempt. Returns the number of recipients.
    pub async fn create_for_semester(
        &self,
        sender: &Identity,
        semester: Semester,
        draft: NotificationDraft,
    ) -> Result<usize, ChatError> {
        let (title, message) = draft.validate(Some(sender))?;
        let sender_profile = sender.profile();
        let sender_id = sender.user_id.to_string();
        let kind = draft.kind;
        let created_at = Utc::now();

        let notifications = with_db(&self.db, move |db| {
            let recipients = db.user_ids_in_semester(semester.get(), Some(&sender_id))?;
            let payload = draft.payload.map(|p| resolve::payload(db, p)).transpose()?;

            let rows: Vec<NewNotification> = recipients
                .iter()
                .map(|recipient| NewNotification {
                    id: Uuid::new_v4().to_string(),
                    recipient_id: recipient.clone(),
                    sender_id: Some(sender_id.clone()),
                    kind: kind.as_str().to_string(),
                    title: title.clone(),
                    message: message.clone(),
                    payload_kind: draft.payload.map(|p| p.kind.as_str().to_string()),
                    payload_id: draft.payload.map(|p| p.id.to_string()),
                    created_at: timestamp(created_at),
                })
                .collect();
            db.insert_notifications(&rows)?;

            rows.into_iter()
                .map(|row| -> anyhow::Result<Notification> {
                    Ok(Notification {
                        id: resolve::parse_id(&row.id)?,
                        recipient_id: resolve::parse_id(&row.recipient_id)?,
                        sender: Some(sender_profile.clone()),
                        kind,
                        title: row.title,
                        message: row.message,
                        payload: payload.clone(),
                        is_read: false,
                        read_at: None,
                        created_at,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()
        })
        .await?;

        for notification in &notifications {
            self.push(notification).await;
        }

        info!(
            "{} notified {} users of semester {} ({})",
            sender.name,
            notifications.len(),
            semester,
            kind.as_str()
        );
        Ok(notifications.len())
    }

    pub async fn list(
        &self,
        recipient: &Identity,
        page: Option<u32>,
        limit: Option<u32>,
        unread_only: bool,
    ) -> Result<NotificationListResponse, ChatError> {
        let (page, limit) = page_bounds(page, limit);
        let offset = (page - 1).saturating_mul(limit);
        let recipient_id = recipient.user_id.to_string();

        let (notifications, has_more) = with_db(&self.db, move |db| {
            let mut rows = db.list_notifications(&recipient_id, unread_only, limit + 1, offset)?;
            let has_more = rows.len() > limit as usize;
            rows.truncate(limit as usize);
            let resolved = rows
                .into_iter()
                .map(|row| resolve::notification(db, row))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok((resolved, has_more))
        })
        .await?;

        Ok(NotificationListResponse {
            notifications,
            page,
            limit,
            has_more,
        })
    }

    pub async fn unread_count(&self, recipient: &Identity) -> Result<u64, ChatError> {
        let recipient_id = recipient.user_id.to_string();
        Ok(with_db(&self.db, move |db| db.count_unread_notifications(&recipient_id)).await?)
    }

    pub async fn mark_read(&self, recipient: &Identity, id: Uuid) -> Result<(), ChatError> {
        let recipient_id = recipient.user_id.to_string();
        let read_at = timestamp(Utc::now());
        let found = with_db(&self.db, move |db| {
            db.mark_notification_read(&id.to_string(), &recipient_id, &read_at)
        })
        .await?;
        if found { Ok(()) } else { Err(ChatError::NotificationNotFound) }
    }

    pub async fn mark_all_read(&self, recipient: &Identity) -> Result<usize, ChatError> {
        let recipient_id = recipient.user_id.to_string();
        let read_at = timestamp(Utc::now());
        Ok(with_db(&self.db, move |db| db.mark_all_notifications_read(&recipient_id, &read_at)).await?)
    }

    /// Only the recipient may delete a notification.
    pub async fn delete(&self, recipient: &Identity, id: Uuid) -> Result<(), ChatError> {
        let recipient_id = recipient.user_id.to_string();
        let found = with_db(&self.db, move |db| db.delete_notification(&id.to_string(), &recipient_id)).await?;
        if found { Ok(()) } else { Err(ChatError::NotificationNotFound) }
    }

    /// Read-sweep: delete every read notification of the recipient.
    pub async fn sweep_read(&self, recipient: &Identity) -> Result<usize, ChatError> {
        let recipient_id = recipient.user_id.to_string();
        Ok(with_db(&self.db, move |db| db.delete_read_notifications(&recipient_id)).await?)
    }

    /// One push attempt to the recipient's private room, never retried.
    async fn push(&self, notification: &Notification) -> usize {
        self.dispatcher
            .send_to_user(
                notification.recipient_id,
                ServerEvent::Notification {
                    kind: notification.kind,
                    data: notification.clone(),
                },
            )
            .await
    }
}
