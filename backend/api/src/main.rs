//! StakeStream API entry point.
//!
//! Serves the REST API used by the staking dashboard: public project
//! listings and stake intake, plus token-authenticated project management
//! for admins. Off-chain metadata lives in SQLite.

mod admin;
mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod password;
mod projects;
mod stakes;
mod status_sync;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use api::AppState;
use auth::TokenIssuer;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // ─── Background status sync (opt-in) ──────────────────
    if config.status_sync_interval_secs > 0 {
        tokio::spawn(status_sync::run(
            pool.clone(),
            config.status_sync_interval_secs,
        ));
    }

    // ─── REST API ─────────────────────────────────────────
    let state = Arc::new(AppState {
        pool,
        tokens: TokenIssuer::new(&config.jwt_secret),
    });
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!(
        "Server running in {} mode on http://{addr}",
        config.environment
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
