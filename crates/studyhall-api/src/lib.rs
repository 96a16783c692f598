pub mod admin;
pub mod auth;
pub mod chat;
pub mod error;
pub mod middleware;
pub mod notifications;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// REST routes: `/auth/*` is public, everything else needs a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/chat/{room}/messages", get(chat::get_messages))
        .route("/chat/{room}/unread-count", get(chat::unread_count))
        .route("/chat/messages/{id}/read", put(chat::mark_read))
        .route("/notifications", post(notifications::create).get(notifications::list))
        .route("/notifications/semester/{semester}", post(notifications::create_for_semester))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/read", delete(notifications::sweep_read))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete))
        .route("/admin/users/{id}/active", put(admin::set_active))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
