//! Read-only status and metrics endpoints.
//!
//! Operators use these to spot poison-message storms (`dropped_invalid`
//! climbing) or downstream outages (`dropped_publish_fail` climbing)
//! without reading logs.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::{AppState, CountersSnapshot};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connected: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connected: state.connected.load(Ordering::Relaxed),
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub started_at: String,
    pub uptime_secs: i64,
    pub tracked_entities: usize,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let now = chrono::Utc::now();
    Json(StatusResponse {
        connected: state.connected.load(Ordering::Relaxed),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: now.signed_duration_since(state.started_at).num_seconds(),
        tracked_entities: state.store.tracked(),
    })
}

#[derive(Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub counters: CountersSnapshot,
    pub tracked_entities: usize,
    pub connected: bool,
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        counters: state.counters.snapshot(),
        tracked_entities: state.store.tracked(),
        connected: state.connected.load(Ordering::Relaxed),
    })
}

/// Build the status router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use vitalwatch_engine::StateStore;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(crate::state::Counters::new()),
            Arc::new(StateStore::new()),
        ))
    }

    #[tokio::test]
    async fn test_health_reports_connection_flag() {
        let state = app_state();
        state.connected.store(true, Ordering::Relaxed);
        let response = health(State(state)).await;
        assert_eq!(response.0.status, "ok");
        assert!(response.0.connected);
    }

    #[tokio::test]
    async fn test_metrics_includes_gauge() {
        let state = app_state();
        state.counters.received.fetch_add(5, Ordering::Relaxed);
        state.store.get_or_create(uuid::Uuid::new_v4());

        let response = metrics(State(state)).await;
        assert_eq!(response.0.counters.received, 5);
        assert_eq!(response.0.tracked_entities, 1);
    }
}
