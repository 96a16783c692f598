use std::sync::Arc;

use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, warn};
use uuid::Uuid;

use studyhall_db::Database;
use studyhall_db::models::UserRow;
use studyhall_types::api::Claims;
use studyhall_types::models::{Role, Room, Semester, UserProfile};

use crate::cache::UserCache;
use crate::error::AuthError;
use crate::with_db;

/// Who is behind a connection or request, resolved from an active user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub name: String,
    pub semester: Semester,
    pub role: Role,
    pub profile_picture: Option<String>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn semester_room(&self) -> Room {
        Room::Semester(self.semester)
    }

    pub fn private_room(&self) -> Room {
        Room::User(self.user_id)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id,
            name: self.name.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }
}

impl TryFrom<UserRow> for Identity {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> anyhow::Result<Self> {
        Ok(Identity {
            user_id: row.id.parse()?,
            name: row.name,
            semester: Semester::new(row.semester)
                .ok_or_else(|| anyhow::anyhow!("Corrupt semester {} on user '{}'", row.semester, row.id))?,
            role: Role::parse(&row.role)
                .ok_or_else(|| anyhow::anyhow!("Corrupt role '{}' on user '{}'", row.role, row.id))?,
            profile_picture: row.profile_picture,
        })
    }
}

/// Verifies bearer tokens and resolves them to active users.
#[derive(Clone)]
pub struct Authenticator {
    db: Arc<Database>,
    jwt_secret: Arc<str>,
    cache: Arc<UserCache>,
}

impl Authenticator {
    pub fn new(db: Arc<Database>, jwt_secret: &str, cache: UserCache) -> Self {
        Self {
            db,
            jwt_secret: Arc::from(jwt_secret),
            cache: Arc::new(cache),
        }
    }

    /// Check signature and expiry only.
    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected token: {}", e);
            AuthError::InvalidToken
        })
    }

    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;
        let claims = self.decode_token(token)?;

        if let Some(identity) = self.cache.get(claims.sub) {
            return Ok(identity);
        }

        let uid = claims.sub.to_string();
        let row = with_db(&self.db, move |db| db.get_user_by_id(&uid))
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if !row.is_active {
            warn!("Inactive account {} tried to authenticate", row.id);
            return Err(AuthError::InactiveAccount);
        }

        let identity = Identity::try_from(row)?;
        self.cache.insert(identity.clone());
        Ok(identity)
    }

    /// Drop a cached user so the next request re-reads the store.
    pub fn invalidate(&self, user_id: Uuid) {
        self.cache.invalidate(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, token_for};
    use std::time::Duration;

    const SECRET: &str = "test-secret";

    fn authenticator(db: Arc<Database>) -> Authenticator {
        Authenticator::new(db, SECRET, UserCache::new(16, Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn resolves_active_user() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ana = seed_user(&db, "ana", 3, Role::Student);
        let auth = authenticator(db);

        let identity = auth
            .authenticate(Some(&token_for(SECRET, &ana, 60)))
            .await
            .unwrap();
        assert_eq!(identity, ana);
        assert_eq!(identity.semester_room().to_string(), "semester-3");
    }

    #[tokio::test]
    async fn rejects_missing_bad_and_expired_tokens() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ana = seed_user(&db, "ana", 3, Role::Student);
        let auth = authenticator(db);

        assert!(matches!(auth.authenticate(None).await, Err(AuthError::MissingToken)));
        assert!(matches!(auth.authenticate(Some("  ")).await, Err(AuthError::MissingToken)));
        assert!(matches!(
            auth.authenticate(Some("not.a.jwt")).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            auth.authenticate(Some(&token_for("other-secret", &ana, 60))).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            auth.authenticate(Some(&token_for(SECRET, &ana, -3600))).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn rejects_inactive_and_unknown_accounts() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ana = seed_user(&db, "ana", 3, Role::Student);
        let ghost = Identity {
            user_id: Uuid::new_v4(),
            ..ana.clone()
        };
        db.set_user_active(&ana.user_id.to_string(), false).unwrap();
        let auth = authenticator(db);

        assert!(matches!(
            auth.authenticate(Some(&token_for(SECRET, &ana, 60))).await,
            Err(AuthError::InactiveAccount)
        ));
        assert!(matches!(
            auth.authenticate(Some(&token_for(SECRET, &ghost, 60))).await,
            Err(AuthError::UnknownUser)
        ));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ana = seed_user(&db, "ana", 3, Role::Student);
        let auth = authenticator(db.clone());
        let token = token_for(SECRET, &ana, 60);

        auth.authenticate(Some(&token)).await.unwrap();
        db.set_user_active(&ana.user_id.to_string(), false).unwrap();
        auth.invalidate(ana.user_id);

        assert!(matches!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::InactiveAccount)
        ));
    }
}
