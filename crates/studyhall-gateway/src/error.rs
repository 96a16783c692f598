use axum::http::StatusCode;
use thiserror::Error;

use studyhall_types::models::MAX_MESSAGE_LEN;

/// Why a connection or request could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingToken,

    #[error("invalid or expired credential")]
    InvalidToken,

    #[error("unknown user")]
    UnknownUser,

    #[error("account is inactive")]
    InactiveAccount,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Failure of a single chat or notification operation. The `Display` text
/// is what the offending connection receives in its `error` event.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("not allowed in this room")]
    RoomForbidden,

    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message exceeds {} characters", MAX_MESSAGE_LEN)]
    MessageTooLong,

    #[error("invalid emoji")]
    InvalidEmoji,

    #[error("message not found")]
    MessageNotFound,

    #[error("reply target not found")]
    ReplyNotFound,

    #[error("not your message")]
    NotYourMessage,

    #[error("edit window expired")]
    EditWindowExpired,

    #[error("message deleted")]
    MessageDeleted,

    #[error("not allowed to delete this message")]
    DeleteForbidden,

    #[error("notification not found")]
    NotificationNotFound,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("admin role required")]
    AdminRequired,

    #[error("invalid notification: {0}")]
    InvalidNotification(&'static str),

    /// Details are logged server side, never sent to clients.
    #[error("something went wrong")]
    Storage(#[from] anyhow::Error),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::RoomForbidden
            | ChatError::NotYourMessage
            | ChatError::EditWindowExpired
            | ChatError::DeleteForbidden
            | ChatError::AdminRequired => StatusCode::FORBIDDEN,
            ChatError::EmptyMessage
            | ChatError::MessageTooLong
            | ChatError::InvalidEmoji
            | ChatError::InvalidNotification(_) => StatusCode::BAD_REQUEST,
            ChatError::MessageNotFound
            | ChatError::ReplyNotFound
            | ChatError::NotificationNotFound
            | ChatError::RecipientNotFound => StatusCode::NOT_FOUND,
            ChatError::MessageDeleted => StatusCode::CONFLICT,
            ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_details_stay_server_side() {
        let err = ChatError::from(anyhow::anyhow!("disk I/O error at /var/db"));
        assert_eq!(err.to_string(), "something went wrong");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn scoped_messages() {
        assert_eq!(ChatError::EditWindowExpired.to_string(), "edit window expired");
        assert_eq!(ChatError::NotYourMessage.to_string(), "not your message");
        assert_eq!(ChatError::MessageTooLong.to_string(), "message exceeds 1000 characters");
        assert_eq!(AuthError::InactiveAccount.status(), StatusCode::UNAUTHORIZED);
    }
}
