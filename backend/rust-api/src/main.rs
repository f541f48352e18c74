use anyhow::Context;
use std::sync::Arc;

use quizthon_api::{config::Config, create_router, services::AppState, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = telemetry::init_tracing(
        "quizthon-api",
        "quizthon_api=debug,tower_http=debug",
    );

    tracing::info!("Starting Quizthon API");

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        environment = %config.app_env,
        store = ?config.store,
        "Configuration loaded"
    );

    let port = config.port;
    let app_state = Arc::new(
        AppState::from_config(config)
            .await
            .context("Failed to initialize application state")?,
    );

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
