//! Petal server binary.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use petal_db::{Database, DbConfig};
use petal_server::{router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Petal server...");

    let config = ServerConfig::load().context("loading configuration")?;
    info!(
        bind = %config.bind_addr,
        database = %config.database_path,
        policy = ?config.option_deletion_policy,
        "Configuration loaded"
    );

    if config.jwt_secret.is_none() {
        warn!("PETAL_JWT_SECRET is not set; authenticated routes will answer 503");
    }

    let db = Database::new(
        DbConfig::new(&config.database_path).write_timeout(config.write_timeout()),
    )
    .await
    .context("opening database")?;

    let state = AppState::from_config(db.clone(), &config);
    let app = router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Petal server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,petal=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
