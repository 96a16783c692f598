use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use studyhall_gateway::access::RoomAccess;
use studyhall_gateway::auth::Identity;
use studyhall_gateway::notifier::NotificationDraft;
use studyhall_types::api::{
    CountResponse, CreateNotificationRequest, NotificationQuery, SemesterNotificationRequest,
};
use studyhall_types::models::{Room, Semester};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateNotificationRequest>,
) -> ApiResult<impl IntoResponse> {
    let draft = NotificationDraft {
        kind: req.kind,
        title: req.title,
        message: req.message,
        payload: req.payload,
    };
    let notification = state
        .notifier
        .create(Some(&identity), req.recipient_id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// Fan out to a whole semester. Students may only address their own
/// semester; admins may address any.
pub async fn create_for_semester(
    State(state): State<AppState>,
    Path(semester): Path<u8>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SemesterNotificationRequest>,
) -> ApiResult<impl IntoResponse> {
    let semester = Semester::new(semester).ok_or(ApiError::BadRequest("semester must be 1-8"))?;
    if !identity.is_admin() {
        identity.authorize(&Room::Semester(semester))?;
    }

    let draft = NotificationDraft {
        kind: req.kind,
        title: req.title,
        message: req.message,
        payload: req.payload,
    };
    let count = state
        .notifier
        .create_for_semester(&identity, semester, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(CountResponse { count: count as u64 })))
}

/// `GET /notifications`: newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .notifier
        .list(&identity, query.page, query.limit, query.unread_only)
        .await?;
    Ok(Json(page))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let count = state.notifier.unread_count(&identity).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    state.notifier.mark_read(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let count = state.notifier.mark_all_read(&identity).await?;
    Ok(Json(CountResponse { count: count as u64 }))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    state.notifier.delete(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sweep_read(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let count = state.notifier.sweep_read(&identity).await?;
    Ok(Json(CountResponse { count: count as u64 }))
}
