use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use studyhall_gateway::error::{AuthError, ChatError};

/// Error returned by REST handlers, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("authentication error")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("e-mail already registered")]
    EmailTaken,

    #[error("admin role required")]
    Forbidden,

    #[error("user not found")]
    UserNotFound,

    #[error("something went wrong")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Chat(e) => e.status(),
            ApiError::Auth(e) => e.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::EmailTaken => StatusCode::CONFLICT,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(cause) | ApiError::Chat(ChatError::Storage(cause)) => {
                error!("Request failed: {:#}", cause);
            }
            ApiError::Auth(AuthError::Storage(cause)) => {
                error!("Authentication lookup failed: {:#}", cause);
            }
            _ => {}
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
