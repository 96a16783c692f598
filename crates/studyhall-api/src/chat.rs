use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use studyhall_gateway::auth::Identity;
use studyhall_types::api::{CountResponse, PageQuery};

use crate::auth::AppState;
use crate::error::ApiResult;

/// `GET /chat/{room}/messages`: one page of history, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<PageQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let history = state
        .broker
        .history(&identity, &room, query.page, query.limit)
        .await?;
    Ok(Json(history))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let count = state.broker.unread_count(&identity, &room).await?;
    Ok(Json(CountResponse { count }))
}

/// Same semantics as the socket `mark-read` event, including the broadcast.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    state.broker.mark_read(&identity, message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
