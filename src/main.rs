//! Fleet Hub server binary.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use fleet_hub::adapters::storage::FileDurableStorage;
use fleet_hub::config::{AppConfig, LogFormat};
use fleet_hub::server::{assemble, ServerError};

/// Upper bound on waiting for queued durable writes at shutdown.
const FLUSH_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let addr = config.server.socket_addr()?;
    let storage = Arc::new(FileDurableStorage::new(&config.hub.data_dir));
    let server = assemble(&config, storage).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watchdog = server.hub.watchdog();
    let watchdog_handle = tokio::spawn(async move { watchdog.run(shutdown_rx).await });

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Fleet hub listening");

    axum::serve(listener, server.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    if shutdown_tx.send(true).is_err() {
        tracing::debug!("Watchdog already stopped");
    }
    if let Err(e) = watchdog_handle.await {
        tracing::error!(error = %e, "Watchdog task failed");
    }

    if tokio::time::timeout(FLUSH_GRACE, server.hub.flushed())
        .await
        .is_err()
    {
        tracing::warn!("Durable writes still pending at exit");
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    match config.server.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("SIGINT received"),
        _ = terminate => tracing::warn!("SIGTERM received"),
    }
}
