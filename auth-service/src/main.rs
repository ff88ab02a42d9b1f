use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use coffeedia_auth::config::load_app_config;
use coffeedia_auth::credentials::{Argon2Verifier, CredentialVerifier, TrustIdentity};
use coffeedia_auth::identity_store::PgIdentityStore;
use coffeedia_auth::{build_router, default_route_policy, AppState};
use common_auth::SystemClock;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_app_config()?;
    if config.using_dev_secret {
        warn!("JWT_SECRET not set; using the development signing secret");
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to DATABASE_URL")?;
    let identities = Arc::new(PgIdentityStore::new(pool));

    let credentials: Arc<dyn CredentialVerifier> = if config.verify_passwords {
        Arc::new(Argon2Verifier)
    } else {
        warn!("AUTH_VERIFY_PASSWORDS is off; login accepts any password for active users");
        Arc::new(TrustIdentity)
    };

    let state = AppState::new(
        &config.jwt,
        identities,
        credentials.clone(),
        Arc::new(SystemClock),
        default_route_policy(&config.admin_role),
        config.identity_lookup_timeout,
    )?;
    let app = build_router(state, &config.cors_allowed_origins, Router::new());

    let addr = config.socket_addr()?;
    info!(
        %addr,
        algorithm = config.jwt.algorithm.as_str(),
        credentials = credentials.name(),
        admin_role = %config.admin_role,
        "starting coffeedia-auth"
    );
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
