//! Liveness, health and metrics routes

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use stress_monitor::CaptureStatus;

use crate::AppState;

/// Liveness message
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Stress Level Detector API is running!" }))
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// `None` when no live source is configured
    pub capture: Option<CaptureStatus>,
    /// Unix milliseconds of the latest stored result
    pub last_update_ms: Option<i64>,
}

/// Health check handler
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let capture = state.capture.as_ref().map(|rx| rx.borrow().clone());
    let last_update_ms = state
        .results
        .latest()
        .map(|latest| latest.produced_at.timestamp_millis());

    let status = match &capture {
        Some(c) if c.state.is_finished() => "degraded",
        _ => "healthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        capture,
        last_update_ms,
    })
}

/// Prometheus exposition, empty when no recorder is installed
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
