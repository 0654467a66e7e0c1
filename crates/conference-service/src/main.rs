//! Conference Service
//!
//! Webhook server for the text-driven conference coordinator.

use conference_service::config::Config;
use conference_service::coordinator::{Coordinator, CoordinatorSettings};
use conference_service::gateway::{GatewaySettings, HttpGateway};
use conference_service::observability::{
    init_tracing, metrics::init_metrics_recorder, DEFAULT_LOG_FILTER,
};
use conference_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // Logging first so a bad configuration is reported through it
    init_tracing(
        DEFAULT_LOG_FILTER,
        config.as_ref().is_ok_and(|c| c.json_logs),
    );

    info!(target: "cs.config", "Starting Conference Service");

    let config = config.map_err(|e| {
        error!(target: "cs.config", "Failed to load configuration: {}", e);
        e
    })?;

    info!(
        target: "cs.config",
        bind_address = %config.bind_address,
        api_base_url = %config.api_base_url,
        system_number = %config.system_number,
        organizer = %config.organizer_number,
        min_participants = config.min_participants,
        max_participants = config.max_participants,
        fanout_concurrency = config.fanout_concurrency,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let gateway = HttpGateway::new(GatewaySettings::from_config(&config)).map_err(|e| {
        error!(target: "cs.gateway", "Failed to create provider client: {}", e);
        e
    })?;

    let coordinator = Arc::new(Coordinator::new(
        Arc::new(gateway),
        CoordinatorSettings::from_config(&config),
    ));

    let state = Arc::new(AppState { coordinator });
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Conference Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Conference Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
