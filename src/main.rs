//! Transfer Controller - Multi-hop transfer routing and saga execution
//!
//! Routes transfer orders across custody networks and drives each order
//! through its persisted state machine, one crash-safe transition at a time.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod api;
mod config;
mod error;
mod metrics;
mod model;
mod routing;
mod saga;
mod state;
mod vendor;

use config::Settings;
use metrics::MetricsServer;
use routing::RoutingCache;
use saga::{Dispatcher, FailureMonitor, SagaExecutor};
use state::StateManager;
use vendor::{NoopVendor, TransferVendor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Transfer Controller v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        instance_id = %settings.controller.instance_id,
        "Loaded configuration"
    );

    // Initialize database connection
    let state_manager = Arc::new(StateManager::new(&settings.database).await?);
    info!("Database connection established");

    // Run migrations
    state_manager.run_migrations().await?;
    info!("Database migrations complete");

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Initialize the saga engine
    let routing_cache = Arc::new(RoutingCache::new(state_manager.clone()));
    let transfer_vendor: Arc<dyn TransferVendor> = Arc::new(NoopVendor);
    let executor = Arc::new(SagaExecutor::new(
        state_manager.clone(),
        routing_cache,
        transfer_vendor,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        state_manager.clone(),
        executor,
        settings.controller.clone(),
    ));
    let failure_monitor = Arc::new(FailureMonitor::new(
        state_manager.clone(),
        settings.controller.monitor_interval_ms,
    ));
    info!("Saga engine initialized");

    // Start API server
    let api_handle = tokio::spawn({
        let settings = settings.clone();
        let state_manager = state_manager.clone();
        async move {
            if let Err(e) = api::run_server(settings.api, state_manager).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Start dispatch loop
    let dispatcher_handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move {
            if let Err(e) = dispatcher.run().await {
                error!("Dispatcher error: {}", e);
            }
        }
    });

    // Start failure monitor
    let monitor_handle = tokio::spawn({
        let monitor = failure_monitor.clone();
        async move {
            if let Err(e) = monitor.run().await {
                error!("Failure monitor error: {}", e);
            }
        }
    });

    // Health check loop
    let health_handle = tokio::spawn({
        let state_manager = state_manager.clone();
        let interval = settings.controller.health_check_interval_secs;
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                match state_manager.health_check().await {
                    Ok(()) => metrics::record_health_check(),
                    Err(e) => {
                        warn!("Database health check failed: {}", e);
                        metrics::record_health_check_failure();
                    }
                }
            }
        }
    });

    info!("Transfer Controller is running");
    info!(
        "API server: http://{}:{}",
        settings.api.host, settings.api.port
    );
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Graceful shutdown
    dispatcher.stop().await;
    failure_monitor.stop().await;

    // Abort background tasks
    api_handle.abort();
    dispatcher_handle.abort();
    monitor_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Transfer Controller stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,transfer_controller=debug,sqlx=warn,hyper=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
