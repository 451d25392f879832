//! Piggybook API server entry point.

use std::net::SocketAddr;

use piggybook_api::config::AppConfig;
use piggybook_api::error::AppError;
use piggybook_api::state::AppState;
use piggybook_api::telemetry;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let telemetry = telemetry::init()?;

    tracing::info!("Starting Piggybook API server");

    let config = AppConfig::from_env()?;
    tracing::info!(cache = %config.cache, "cache backend selected");

    let state = AppState::from_config(&config).await?;
    let app = piggybook_api::app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    telemetry.shutdown();
    served.map_err(AppError::from)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
