//! Docker stats collector binary
//!
//! Runs the HTTP API and the eviction sweeper against one shared
//! in-memory snapshot store.

use anyhow::{anyhow, Context, Result};
use stats_collector::{api, config::CollectorConfig};
use stats_core::{
    dispatch::{AgentAddressing, DispatchController, HttpPruneDispatcher},
    health::{components, HealthRegistry},
    observability::{CollectorMetrics, StructuredLogger},
    store::{EvictionSweeper, SnapshotStore, SweepConfig},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const COLLECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = CollectorConfig::load()?;
    info!(
        listen_port = config.listen_port,
        agent_port = config.agent_port,
        "Collector configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SWEEPER).await;

    let metrics = CollectorMetrics::new();
    let logger = StructuredLogger::new("collector");
    logger.log_startup("collector", COLLECTOR_VERSION);

    let store = Arc::new(SnapshotStore::new());

    let dispatcher = HttpPruneDispatcher::new(
        AgentAddressing::with_port(config.agent_port),
        config.dispatch_timeout(),
    )?;
    let dispatch = Arc::new(DispatchController::new(
        store.clone(),
        Arc::new(dispatcher),
        metrics.clone(),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);

    let sweeper = EvictionSweeper::new(
        store.clone(),
        SweepConfig {
            interval: config.sweep_interval(),
            retention: config.retention(),
        },
        metrics.clone(),
        health_registry.clone(),
    );
    let mut sweeper_handle = tokio::spawn(sweeper.run(shutdown_tx.subscribe()));

    // Failing to bind is fatal.
    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let app_state = Arc::new(api::AppState::new(
        store,
        dispatch,
        health_registry.clone(),
        metrics,
    ));
    health_registry.set_ready(true).await;

    let mut api_handle = tokio::spawn(api::serve(listener, app_state, shutdown_tx.subscribe()));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        result = &mut sweeper_handle => {
            let _ = shutdown_tx.send(());
            let _ = api_handle.await;
            return match result {
                Ok(()) => Err(anyhow!("Eviction sweeper stopped unexpectedly")),
                Err(e) => Err(anyhow!("Eviction sweeper panicked: {e}")),
            };
        }
        result = &mut api_handle => {
            let _ = shutdown_tx.send(());
            let _ = sweeper_handle.await;
            return match result {
                Ok(Ok(())) => Err(anyhow!("API server stopped unexpectedly")),
                Ok(Err(e)) => Err(e.context("API server failed")),
                Err(e) => Err(anyhow!("API task panicked: {e}")),
            };
        }
    }

    let _ = shutdown_tx.send(());
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API task panicked"),
        Ok(Ok(())) => {}
    }
    sweeper_handle.await?;

    Ok(())
}
