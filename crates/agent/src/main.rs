//! Docker stats agent
//!
//! Runs on every Docker host: reports local image usage to the collector,
//! prunes daily, and accepts prune requests from the collector.

use anyhow::{Context, Result};
use stats_core::{
    agent::{AgentLoop, AgentTasks, DockerRuntime, ScheduleConfig, StatsReporter},
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AgentConfig::load()?;
    info!(
        instance_id = %config.instance_id,
        remote_server = %config.remote_server_url,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::DOCKER).await;
    health_registry.register(components::REPORTER).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.instance_id);
    logger.log_startup("agent", AGENT_VERSION);

    let runtime = DockerRuntime::connect().context("Failed to create Docker client")?;
    let reporter = StatsReporter::new(&config.remote_server_url, config.report_timeout())?;
    let tasks = Arc::new(AgentTasks::new(
        config.instance_id.clone(),
        Arc::new(runtime),
        reporter,
        health_registry.clone(),
        metrics,
    ));

    let (shutdown_tx, _) = broadcast::channel(1);

    // Failing to bind is fatal.
    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let app_state = Arc::new(api::AppState::new(tasks.clone(), health_registry.clone()));
    let api_handle = tokio::spawn(api::serve(listener, app_state, shutdown_tx.subscribe()));

    let agent_loop = AgentLoop::new(
        tasks,
        ScheduleConfig {
            stats_interval: config.stats_interval(),
            prune_interval: config.prune_interval(),
        },
    );
    let loop_handle = tokio::spawn(agent_loop.run(shutdown_tx.subscribe()));

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API task panicked"),
        Ok(Ok(())) => {}
    }
    loop_handle.await?;

    Ok(())
}
