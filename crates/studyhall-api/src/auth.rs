use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use studyhall_db::Database;
use studyhall_db::models::NewUser;
use studyhall_gateway::auth::{Authenticator, Identity};
use studyhall_gateway::broker::Broker;
use studyhall_gateway::cache::UserCache;
use studyhall_gateway::dispatcher::Dispatcher;
use studyhall_gateway::notifier::Notifier;
use studyhall_gateway::with_db;
use studyhall_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use studyhall_types::models::Role;

use crate::error::{ApiError, ApiResult};

const MAX_NAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 8;

pub type AppState = Arc<AppStateInner>;

/// Everything the HTTP and WebSocket handlers share.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// Lower-cased addresses that register with the admin role
    pub admin_emails: Vec<String>,
    pub dispatcher: Dispatcher,
    pub broker: Broker,
    pub notifier: Notifier,
    pub authenticator: Authenticator,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        jwt_secret: &str,
        token_ttl: chrono::Duration,
        admin_emails: Vec<String>,
        cache: UserCache,
    ) -> Self {
        let dispatcher = Dispatcher::new();
        Self {
            broker: Broker::new(db.clone(), dispatcher.clone()),
            notifier: Notifier::new(db.clone(), dispatcher.clone()),
            authenticator: Authenticator::new(db.clone(), jwt_secret, cache),
            jwt_secret: jwt_secret.to_string(),
            admin_emails: admin_emails.into_iter().map(|e| e.trim().to_lowercase()).collect(),
            token_ttl,
            dispatcher,
            db,
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();

    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest("name must be 1-50 characters"));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("invalid e-mail"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }

    let lookup = email.clone();
    if with_db(&state.db, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::EmailTaken);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let role = if state.admin_emails.contains(&email) {
        Role::Admin
    } else {
        Role::Student
    };
    let user_id = Uuid::new_v4();

    let identity = Identity {
        user_id,
        name,
        semester: req.semester,
        role,
        profile_picture: req.profile_picture.filter(|p| !p.trim().is_empty()),
    };

    let row = identity.clone();
    with_db(&state.db, move |db| {
        db.create_user(&NewUser {
            id: &row.user_id.to_string(),
            name: &row.name,
            email: &email,
            password_hash: &password_hash,
            semester: row.semester.get(),
            role: row.role.as_str(),
            profile_picture: row.profile_picture.as_deref(),
        })
    })
    .await
    .map_err(registration_error)?;

    info!("Registered {} ({}) in semester {}", identity.name, identity.user_id, identity.semester);

    let token = create_token(&state.jwt_secret, &identity, state.token_ttl)?;
    Ok((StatusCode::CREATED, Json(auth_response(identity, token))))
}

/// A concurrent registration can pass the lookup above and still lose the
/// insert.
fn registration_error(err: anyhow::Error) -> ApiError {
    if studyhall_db::is_unique_violation(&err) {
        ApiError::EmailTaken
    } else {
        ApiError::Internal(err)
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let user = with_db(&state.db, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash for {} is unreadable: {}", user.id, e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    if !user.is_active {
        warn!("Inactive account {} tried to log in", user.id);
        return Err(ApiError::InvalidCredentials);
    }

    let identity = Identity::try_from(user)?;
    let token = create_token(&state.jwt_secret, &identity, state.token_ttl)?;
    Ok(Json(auth_response(identity, token)))
}

pub fn create_token(secret: &str, identity: &Identity, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: identity.user_id,
        name: identity.name.clone(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn auth_response(identity: Identity, token: String) -> AuthResponse {
    AuthResponse {
        user_id: identity.user_id,
        name: identity.name,
        semester: identity.semester,
        role: identity.role,
        token,
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
