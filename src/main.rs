//! Pickup - bootstrap binary
//!
//! Loads configuration, connects the store, applies migrations and wires the
//! services together. A persisted session token can be handed in through
//! `PICKUP_SESSION_TOKEN` to exercise restoration at start-up.

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pickup::{
    config::Config,
    db::{
        self,
        repositories::{SqlxGroupRepository, SqlxSessionRepository, SqlxUserRepository},
    },
    services::{
        auth::AuthService, group_listing::GroupListingProjector, route_guard::RouteGuard,
        session_store::SessionStore, RouteSegment,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pickup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pickup...");

    // Load configuration
    let config = Config::load_with_env(Path::new("pickup.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Wire services around one session store
    let sessions = SessionStore::new();
    let auth = AuthService::new(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
        sessions.clone(),
        config.session.clone(),
    );
    let groups = SqlxGroupRepository::boxed(pool.clone());
    let listing = GroupListingProjector::new(groups, sessions.clone());
    let guard = RouteGuard::new(config.routes.clone());

    let removed = auth.cleanup_expired_sessions().await?;
    tracing::info!("Expired sessions removed: {}", removed);

    let token = std::env::var("PICKUP_SESSION_TOKEN").ok();
    let restored = match auth.restore(token.as_deref()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Session restore failed: {}", e);
            None
        }
    };

    let landing = guard.decide_snapshot(&sessions.snapshot(), &RouteSegment::parse(&config.routes.app_entry));
    tracing::info!(signed_in = restored.is_some(), ?landing, "Start-up route decided");

    if restored.is_some() {
        match listing.list_my_groups().await {
            Ok(items) => tracing::info!("Signed-in user belongs to {} group(s)", items.len()),
            Err(e) => tracing::warn!("Failed to list groups: {}", e.user_message()),
        }
    }

    tracing::info!("Pickup ready");
    Ok(())
}
