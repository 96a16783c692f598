use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::TypedHeaderRejection;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use studyhall_api::auth::AppState;
use studyhall_gateway::cache::UserCache;
use studyhall_gateway::connection;

/// Secrets that ship in examples and must never sign real tokens.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

/// Process configuration, read from `STUDYHALL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub admin_emails: Vec<String>,
    pub user_cache_size: usize,
    pub user_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("STUDYHALL_JWT_SECRET").context("STUDYHALL_JWT_SECRET is not set")?;
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("STUDYHALL_JWT_SECRET is a placeholder, set a real secret");
        }

        let port = var("STUDYHALL_PORT", "3000")
            .parse()
            .context("STUDYHALL_PORT must be a port number")?;
        let ttl_days: i64 = var("STUDYHALL_TOKEN_TTL_DAYS", "30")
            .parse()
            .context("STUDYHALL_TOKEN_TTL_DAYS must be a number of days")?;
        if ttl_days <= 0 {
            bail!("STUDYHALL_TOKEN_TTL_DAYS must be positive");
        }
        let user_cache_size = var("STUDYHALL_USER_CACHE_SIZE", "1024")
            .parse()
            .context("STUDYHALL_USER_CACHE_SIZE must be a number")?;
        let cache_ttl_secs = var("STUDYHALL_USER_CACHE_TTL_SECS", "300")
            .parse()
            .context("STUDYHALL_USER_CACHE_TTL_SECS must be a number of seconds")?;

        let admin_emails = var("STUDYHALL_ADMIN_EMAILS", "")
            .split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            host: var("STUDYHALL_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(var("STUDYHALL_DB_PATH", "studyhall.db")),
            jwt_secret,
            token_ttl: chrono::Duration::days(ttl_days),
            admin_emails,
            user_cache_size,
            user_cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn user_cache(&self) -> UserCache {
        UserCache::new(self.user_cache_size, self.user_cache_ttl)
    }
}

/// Full HTTP surface: REST routes, the WebSocket gateway and a health check.
pub fn build_app(state: AppState) -> Router {
    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state.clone());

    Router::new()
        .merge(studyhall_api::router(state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Authenticate before the handshake; failures never reach the socket.
/// A header that is not a Bearer credential falls through to `?token=`.
async fn ws_upgrade(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = bearer
        .as_ref()
        .ok()
        .map(|TypedHeader(auth)| auth.token())
        .or(query.token.as_deref());

    match state.authenticator.authenticate(token).await {
        Ok(identity) => {
            let dispatcher = state.dispatcher.clone();
            let broker = state.broker.clone();
            ws.on_upgrade(move |socket| {
                connection::handle_connection(socket, identity, dispatcher, broker)
            })
        }
        Err(e) => {
            warn!("Refused WebSocket upgrade: {}", e);
            (e.status(), "authentication error").into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.dispatcher.connection_count().await;
    (StatusCode::OK, Json(json!({ "status": "ok", "connections": connections })))
}
