//! Background health aggregation for HTTP services.
//!
//! A [`HealthCheckManager`] polls registered component checks on a fixed
//! delay, aggregates them into one [`SystemHealth`] snapshot and serves that
//! snapshot to readers without ever running a check on their behalf.
//! [`HealthMonitor`] binds a manager to an axum service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod monitor;

pub use config::AppConfig;
pub use error::{CheckError, CheckResult, HealthError, Result};
pub use health::{
    blocking, CheckFunction, CheckRunner, ComponentHealth, ComponentType, FilesystemCheck,
    HealthCheckManager, HealthStatus, ManagerConfig, ServiceInfo, SystemHealth,
    CHECK_FAILURE_OUTPUT,
};
pub use middleware::with_request_logging;
pub use monitor::HealthMonitor;

use axum::Router;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

/// Serves `app` until SIGINT/SIGTERM, keeping `monitor` running for exactly
/// the lifetime of the server.
pub async fn run_server(app: Router, addr: SocketAddr, monitor: &HealthMonitor) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    monitor.start()?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    monitor.shutdown().await;

    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
