//! HTTP API: agent ingest, manual prune, dashboard, health and metrics

use crate::dashboard;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use stats_core::{
    dispatch::{DispatchController, DispatchError},
    health::HealthRegistry,
    ingest,
    observability::{CollectorMetrics, StructuredLogger},
    store::SnapshotStore,
    ComponentStatus, Snapshot, StatsReport,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub dispatch: Arc<DispatchController>,
    pub health_registry: HealthRegistry,
    pub metrics: CollectorMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        store: Arc<SnapshotStore>,
        dispatch: Arc<DispatchController>,
        health_registry: HealthRegistry,
        metrics: CollectorMetrics,
    ) -> Self {
        Self {
            store,
            dispatch,
            health_registry,
            metrics,
            logger: StructuredLogger::new("collector"),
        }
    }

    /// Current snapshots ordered by instance id
    async fn sorted_snapshots(&self) -> Vec<Snapshot> {
        let mut snapshots = self.store.list().await;
        snapshots.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        snapshots
    }
}

/// Agents report here: `POST /api/docker-stats`
async fn ingest_stats(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let report: StatsReport = match serde_json::from_slice(&body) {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Rejecting undecodable stats report");
            state.metrics.inc_ingest_rejected();
            return (StatusCode::BAD_REQUEST, "Bad JSON\n").into_response();
        }
    };

    match ingest::ingest(&state.store, report).await {
        Ok(snapshot) => {
            state.logger.log_ingest(
                &snapshot.instance_id,
                snapshot.images_size_gb,
                snapshot.prune_action,
                &snapshot.timestamp,
            );
            state.metrics.inc_ingest();
            state.metrics.set_snapshots(state.store.len().await as i64);
            (StatusCode::CREATED, "ok\n").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Rejecting invalid stats report");
            state.metrics.inc_ingest_rejected();
            (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response()
        }
    }
}

/// JSON view of the store: `GET /api/docker-stats`
async fn list_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.sorted_snapshots().await)
}

#[derive(Debug, Deserialize)]
struct PruneParams {
    instance: Option<String>,
}

/// Manual prune: `POST /api/prune?instance=<id>`
async fn manual_prune(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PruneParams>,
) -> Response {
    let instance_id = params.instance.unwrap_or_default();

    match state.dispatch.prune(&instance_id).await {
        Ok(_) => (StatusCode::OK, "Prune done, metrics deleted\n").into_response(),
        Err(DispatchError::MissingInstance) => {
            (StatusCode::BAD_REQUEST, "instance param required\n").into_response()
        }
        Err(DispatchError::Status(status)) => {
            (StatusCode::BAD_GATEWAY, format!("Agent error: status {status}\n")).into_response()
        }
        Err(_) => (StatusCode::BAD_GATEWAY, "Failed to call agent\n").into_response(),
    }
}

/// HTML dashboard: `GET /`
async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(dashboard::render(&state.sorted_snapshots().await))
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/docker-stats", post(ingest_stats).get(list_stats))
        .route("/api/prune", post(manual_prune))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API on an already bound listener until shutdown
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);
    info!(addr = %listener.local_addr()?, "Starting collector API");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
