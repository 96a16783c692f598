use std::sync::Arc;

use tracing::info;

use studyhall_api::auth::{AppState, AppStateInner};
use studyhall_server::{Config, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "studyhall=debug,studyhall_gateway=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(studyhall_db::Database::open(&config.db_path)?);

    let state: AppState = Arc::new(AppStateInner::new(
        db,
        &config.jwt_secret,
        config.token_ttl,
        config.admin_emails.clone(),
        config.user_cache(),
    ));

    let app = build_app(state);

    let addr = config.addr()?;
    info!("Studyhall server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
