//! DevForge service
//!
//! Hosts the action dispatcher behind an HTTP API. The service owns the
//! selection session store and the background sweeper that expires stale
//! sessions.
//!
//! ```no_run
//! # async fn example() -> anyhow::Result<()> {
//! let config = devforge_core::ConfigLoader::new().load().await?;
//! devforge_server::run(&config).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod log_buffer;
pub mod state;
pub mod sweeper;
pub mod version;

pub use api::create_router;
pub use log_buffer::{LogEntry, LogLevel, ServerLog};
pub use state::{AppState, ServerError};

use devforge_core::DevforgeConfig;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, sweep_interval: Duration, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper = sweeper::spawn_sweeper(state.dispatcher.sessions().clone(), sweep_interval);
    let app = create_router(state.clone());

    if let Ok(addr) = listener.local_addr() {
        state.log.info(format!("DevForge service listening on {}", addr));
        tracing::info!(%addr, platform = %state.dispatcher.platform(), "Listening");
    }

    let result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await;

    sweeper.abort();
    result
}

/// Bind to the configured address and serve until Ctrl-C or SIGTERM
pub async fn run(config: &DevforgeConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;

    serve(
        listener,
        state,
        Duration::from_secs(config.sessions.sweep_interval_secs),
        shutdown_signal(),
    )
    .await?;

    tracing::info!("DevForge service shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received CTRL-C signal, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down");
        }
    }
}
