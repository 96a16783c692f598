use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use studyhall_gateway::auth::Identity;
use studyhall_gateway::with_db;
use studyhall_types::api::SetActiveRequest;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// `PUT /admin/users/{id}/active`: switch an account on or off. The cached
/// identity is dropped so the change applies to the next authentication.
pub async fn set_active(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<impl IntoResponse> {
    if !identity.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let id = user_id.to_string();
    let active = req.is_active;
    let found = with_db(&state.db, move |db| db.set_user_active(&id, active)).await?;
    if !found {
        return Err(ApiError::UserNotFound);
    }

    state.authenticator.invalidate(user_id);
    info!("{} set account {} active={}", identity.name, user_id, active);
    Ok(StatusCode::NO_CONTENT)
}
